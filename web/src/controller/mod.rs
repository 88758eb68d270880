pub(crate) mod command_controller;
pub(crate) mod health_check_controller;
pub(crate) mod index_controller;
