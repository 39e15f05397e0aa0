use std::sync::Arc;

use passage_service::PassageService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PassageService>,
}
impl AppState {
	pub fn new(config: passage_config::Config) -> color_eyre::Result<Self> {
		let service = PassageService::from_config(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: PassageService) -> Self {
		Self { service: Arc::new(service) }
	}
}
