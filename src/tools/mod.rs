/// Tools Module
///
/// Each tool module exports a `register` function that adds its descriptor
/// and handler to the dispatcher builder. `initialize_tools` fixes the
/// listing order.

pub mod echo;
pub mod files;
pub mod system;
pub mod user_info;

use tracing::info;

use crate::core::config::ServerConfig;
use crate::core::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::core::registry::RegistryError;

/// Build the dispatcher with every demo tool registered.
///
/// # Errors
/// Fails on duplicate tool names, which aborts startup.
pub fn initialize_tools(config: &ServerConfig) -> Result<Dispatcher, RegistryError> {
    let mut builder = DispatcherBuilder::new();

    echo::register(&mut builder)?;
    user_info::register(&mut builder, config.surface_identity)?;
    files::register(&mut builder, files::demo_catalog())?;
    system::register(&mut builder)?;

    let dispatcher = builder.build(config.handler_timeout);
    info!(tools = dispatcher.registry().len(), "tool registry initialized");
    Ok(dispatcher)
}
