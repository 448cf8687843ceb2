/// get_user_info Tool
///
/// Describes how the gateway surfaces JWT claims to this server. By default
/// the payload is fixed and does not depend on the caller. With
/// `surface_identity` enabled the extracted identity is attached as well.

use serde_json::{json, Value};

use crate::core::dispatcher::{DispatcherBuilder, ToolOutput};
use crate::core::identity::IdentityContext;
use crate::core::registry::{RegistryError, ToolDescriptor};

pub fn register(builder: &mut DispatcherBuilder, surface_identity: bool) -> Result<(), RegistryError> {
    let tool = ToolDescriptor::new(
        "get_user_info",
        "Get information about the currently authenticated user from their JWT token.",
        json!({ "type": "object", "properties": {} }),
    );

    builder.tool(tool, move |_args, identity| {
        Ok(ToolOutput::Json(user_info(identity, surface_identity)))
    })?;
    Ok(())
}

fn user_info(identity: Option<&IdentityContext>, surface_identity: bool) -> Value {
    let mut info = json!({
        "message": "User info would be extracted from JWT claims passed by agentgateway",
        "note": "agentgateway can be configured to pass JWT claims as X-JWT-Claim-* headers",
        "example_claims": {
            "sub": "user-12345",
            "email": "user@example.com",
            "roles": ["user"]
        }
    });

    if surface_identity {
        info["identity"] = json!(identity);
    }
    info
}
