use crate::command::{Command, CommandType};
use crate::gateway::{GatewayCore, GatewayError, GatewayResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

pub const SEND_MESSAGE: &str = "send_message";
pub const EXECUTE_COMMAND: &str = "execute_command";
pub const GET_STATUS: &str = "get_status";
pub const AUTHENTICATE: &str = "authenticate";
pub const REGISTER: &str = "register";

/// Sender recorded on status commands issued through the tool interface
pub const STATUS_SENDER: &str = "tool-gateway";

/// A tool as advertised to callers
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Tool output: a single text block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Concatenated text of all blocks
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageArgs {
    address: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteCommandArgs {
    #[serde(rename = "type")]
    command_type: String,
    payload: String,
    sender: String,
}

#[derive(Debug, Deserialize)]
struct AuthenticateArgs {
    address: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RegisterArgs {
    address: String,
}

/// The five tools with their input schemas
pub fn list_tools() -> Vec<ToolDefinition> {
    let command_types: Vec<&str> = CommandType::all().iter().map(|t| t.as_str()).collect();

    vec![
        ToolDefinition {
            name: SEND_MESSAGE,
            description: "Send a text message to an address",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "Recipient address" },
                    "text": { "type": "string", "description": "Message content" }
                },
                "required": ["address", "text"]
            }),
        },
        ToolDefinition {
            name: EXECUTE_COMMAND,
            description: "Execute an allowlisted command on behalf of an authorized sender",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": command_types,
                        "description": "Command type"
                    },
                    "payload": { "type": "string", "description": "Command arguments" },
                    "sender": { "type": "string", "description": "Address of the requesting sender" }
                },
                "required": ["type", "payload", "sender"]
            }),
        },
        ToolDefinition {
            name: GET_STATUS,
            description: "Report git state and tool versions for the project",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: AUTHENTICATE,
            description: "Check that a token was issued to an address",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "Address to authenticate" },
                    "token": { "type": "string", "description": "Token previously issued by register" }
                },
                "required": ["address", "token"]
            }),
        },
        ToolDefinition {
            name: REGISTER,
            description: "Issue a token to an invited address",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "Address to register" }
                },
                "required": ["address"]
            }),
        },
    ]
}

fn parse_args<T: DeserializeOwned>(args: &Value) -> GatewayResult<T> {
    serde_json::from_value(args.clone()).map_err(|e| GatewayError::InvalidArguments(e.to_string()))
}

fn require(field: &str, value: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidArguments(format!("{} is required", field)));
    }
    Ok(())
}

/// Arguments safe to log: token values are masked
fn redact(args: &Value) -> Value {
    let mut args = args.clone();
    if let Some(token) = args.get_mut("token") {
        *token = Value::String("[redacted]".to_string());
    }
    args
}

impl GatewayCore {
    /// Dispatch a tool call; every failure is logged, then wrapped
    pub(crate) async fn call_tool(&self, name: &str, args: &Value) -> GatewayResult<ToolResponse> {
        let outcome = match name {
            SEND_MESSAGE => self.send_message(args).await,
            EXECUTE_COMMAND => self.execute_command(args).await,
            GET_STATUS => self.get_status().await,
            AUTHENTICATE => self.authenticate(args),
            REGISTER => self.register(args),
            _ => Err(GatewayError::UnknownTool(name.to_string())),
        };

        outcome.map_err(|e| {
            error!(tool = name, error = %e, args = %redact(args), "Tool execution failed");
            GatewayError::ToolFailed {
                tool: name.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn send_message(&self, args: &Value) -> GatewayResult<ToolResponse> {
        let args: SendMessageArgs = parse_args(args)?;
        require("address", &args.address)?;
        require("text", &args.text)?;

        self.messenger.send_message(&args.address, &args.text).await?;

        Ok(ToolResponse::text(format!(
            "Message sent successfully to {}",
            args.address
        )))
    }

    async fn execute_command(&self, args: &Value) -> GatewayResult<ToolResponse> {
        let args: ExecuteCommandArgs = parse_args(args)?;
        require("type", &args.command_type)?;
        require("sender", &args.sender)?;

        if !self.authorizer.is_authorized(&args.sender) {
            return Err(GatewayError::Unauthorized(args.sender));
        }

        let command_type: CommandType = args.command_type.parse()?;
        let mut command = Command::new("tool", command_type, args.payload, args.sender);
        let result = self.processor.process(&mut command).await;

        let mut text = format!(
            "Command executed: {} {}\nResult: {}\nOutput: {}",
            command_type,
            command.payload(),
            if result.success { "Success" } else { "Failed" },
            result.output
        );
        if let Some(error) = &result.error {
            text.push_str(&format!("\nError: {}", error));
        }

        Ok(ToolResponse::text(text))
    }

    async fn get_status(&self) -> GatewayResult<ToolResponse> {
        let mut command = Command::new("status", CommandType::Status, "", STATUS_SENDER);
        let result = self.processor.process(&mut command).await;

        if result.success {
            Ok(ToolResponse::text(result.output))
        } else {
            Ok(ToolResponse::text(format!(
                "Status unavailable: {}",
                result.error.unwrap_or_default()
            )))
        }
    }

    fn authenticate(&self, args: &Value) -> GatewayResult<ToolResponse> {
        let args: AuthenticateArgs = parse_args(args)?;
        require("address", &args.address)?;
        require("token", &args.token)?;

        let valid = self
            .authorizer
            .verify_token(&args.token)
            .is_some_and(|address| address == args.address);

        Ok(ToolResponse::text(format!(
            "Authentication {} for {}",
            if valid { "successful" } else { "failed" },
            args.address
        )))
    }

    fn register(&self, args: &Value) -> GatewayResult<ToolResponse> {
        let args: RegisterArgs = parse_args(args)?;
        require("address", &args.address)?;

        if !self.authorizer.is_authorized(&args.address) {
            return Err(GatewayError::NotInvited(args.address));
        }

        let token = self.authorizer.generate_token(&args.address);
        info!(address = %args.address, "Address registered");

        Ok(ToolResponse::text(format!(
            "Registration successful for {address}\nToken: {token}\n\n\
             Save this token and use it in your messages like:\ntoken:{token} cmd:status",
            address = args.address,
            token = token
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_tools_names() {
        let names: Vec<&str> = list_tools().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![SEND_MESSAGE, EXECUTE_COMMAND, GET_STATUS, AUTHENTICATE, REGISTER]
        );
    }

    #[test]
    fn test_schemas_declare_required_fields() {
        let tools = list_tools();
        let execute = tools.iter().find(|t| t.name == EXECUTE_COMMAND).unwrap();
        assert_eq!(
            execute.input_schema["required"],
            json!(["type", "payload", "sender"])
        );
        assert_eq!(execute.input_schema["properties"]["type"]["enum"][5], "claude");

        let status = tools.iter().find(|t| t.name == GET_STATUS).unwrap();
        assert_eq!(status.input_schema["required"], json!([]));
    }

    #[test]
    fn test_tool_definition_serializes_input_schema_key() {
        let value = serde_json::to_value(&list_tools()[0]).unwrap();
        assert!(value.get("inputSchema").is_some());
    }

    #[test]
    fn test_response_serialization() {
        let value = serde_json::to_value(ToolResponse::text("hi")).unwrap();
        assert_eq!(value, json!({ "content": [{ "type": "text", "text": "hi" }] }));
    }

    #[test]
    fn test_redact_masks_token() {
        let args = json!({ "address": "+15550100", "token": "secret" });
        let redacted = redact(&args);
        assert_eq!(redacted["token"], "[redacted]");
        assert_eq!(redacted["address"], "+15550100");
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("address", "  ").is_err());
        assert!(require("address", "+15550100").is_ok());
    }
}
