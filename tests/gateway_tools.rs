mod helpers;

use cmdrelay::GatewayError;
use cmdrelay::auth::Authorizer;
use helpers::{OPERATOR, RecordingMessenger, STRANGER, ScriptedRunner, TEAMMATE, gateway};
use serde_json::json;
use std::sync::Arc;

fn token_from(text: &str) -> String {
    text.lines()
        .find_map(|line| line.strip_prefix("Token: "))
        .expect("response carries a token")
        .to_string()
}

fn failure_message(err: GatewayError) -> String {
    match err {
        GatewayError::ToolFailed { message, .. } => message,
        other => panic!("expected ToolFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_register_invited_address() {
    let (gateway, registry) = gateway(
        Arc::new(ScriptedRunner::new()),
        Arc::new(RecordingMessenger::new()),
    );

    let response = gateway
        .call_tool("register", &json!({ "address": TEAMMATE }))
        .await
        .unwrap();
    let text = response.as_text();

    assert!(text.starts_with(&format!("Registration successful for {}", TEAMMATE)));
    let token = token_from(&text);
    assert!(text.contains(&format!("token:{} cmd:status", token)));
    assert_eq!(registry.verify_token(&token).as_deref(), Some(TEAMMATE));
}

#[tokio::test]
async fn test_register_uninvited_address_fails() {
    let (gateway, registry) = gateway(
        Arc::new(ScriptedRunner::new()),
        Arc::new(RecordingMessenger::new()),
    );

    let err = gateway
        .call_tool("register", &json!({ "address": STRANGER }))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Tool execution failed: register"));
    assert!(failure_message(err).contains("not authorized for registration"));
    assert_eq!(registry.active_tokens(), 0);
}

#[tokio::test]
async fn test_authenticate_valid_and_tampered_tokens() {
    let (gateway, registry) = gateway(
        Arc::new(ScriptedRunner::new()),
        Arc::new(RecordingMessenger::new()),
    );
    let token = registry.generate_token(OPERATOR);

    let ok = gateway
        .call_tool("authenticate", &json!({ "address": OPERATOR, "token": token }))
        .await
        .unwrap();
    assert_eq!(ok.as_text(), format!("Authentication successful for {}", OPERATOR));

    let mut tampered = token.clone();
    tampered.replace_range(0..1, if token.starts_with('a') { "b" } else { "a" });
    let bad = gateway
        .call_tool("authenticate", &json!({ "address": OPERATOR, "token": tampered }))
        .await
        .unwrap();
    assert_eq!(bad.as_text(), format!("Authentication failed for {}", OPERATOR));

    let other = gateway
        .call_tool("authenticate", &json!({ "address": TEAMMATE, "token": token }))
        .await
        .unwrap();
    assert!(other.as_text().contains("failed"));
}

#[tokio::test]
async fn test_execute_command_for_authorized_sender() {
    let runner = Arc::new(ScriptedRunner::new().reply("git status", "On branch main"));
    let messenger = Arc::new(RecordingMessenger::new());
    let (gateway, _) = gateway(runner.clone(), messenger.clone());

    let response = gateway
        .call_tool(
            "execute_command",
            &json!({ "type": "git", "payload": "status", "sender": TEAMMATE }),
        )
        .await
        .unwrap();

    assert_eq!(
        response.as_text(),
        "Command executed: git status\nResult: Success\nOutput: On branch main"
    );
    assert_eq!(runner.calls(), vec!["git status"]);
    // Results are delivered to the configured address, not the caller
    assert_eq!(messenger.sent_to(OPERATOR).len(), 1);
}

#[tokio::test]
async fn test_execute_command_reports_rejection() {
    let runner = Arc::new(ScriptedRunner::new());
    let (gateway, _) = gateway(runner.clone(), Arc::new(RecordingMessenger::new()));

    let response = gateway
        .call_tool(
            "execute_command",
            &json!({ "type": "git", "payload": "rm -rf .", "sender": OPERATOR }),
        )
        .await
        .unwrap();
    let text = response.as_text();

    assert!(text.contains("Result: Failed"));
    assert!(text.contains("Error: Git command 'rm' is not allowed"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_execute_command_unauthorized_sender() {
    let runner = Arc::new(ScriptedRunner::new());
    let (gateway, _) = gateway(runner.clone(), Arc::new(RecordingMessenger::new()));

    let err = gateway
        .call_tool(
            "execute_command",
            &json!({ "type": "git", "payload": "status", "sender": STRANGER }),
        )
        .await
        .unwrap_err();

    assert!(failure_message(err).contains(STRANGER));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_execute_command_unknown_type() {
    let runner = Arc::new(ScriptedRunner::new());
    let (gateway, _) = gateway(runner.clone(), Arc::new(RecordingMessenger::new()));

    let err = gateway
        .call_tool(
            "execute_command",
            &json!({ "type": "deploy", "payload": "prod", "sender": OPERATOR }),
        )
        .await
        .unwrap_err();

    assert!(failure_message(err).contains("Unknown command type: deploy"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_execute_command_missing_arguments() {
    let (gateway, _) = gateway(
        Arc::new(ScriptedRunner::new()),
        Arc::new(RecordingMessenger::new()),
    );

    let err = gateway
        .call_tool("execute_command", &json!({ "type": "git", "sender": OPERATOR }))
        .await
        .unwrap_err();
    assert!(failure_message(err).contains("Invalid arguments"));

    // An empty payload is present, so it is accepted
    let response = gateway
        .call_tool(
            "execute_command",
            &json!({ "type": "build", "payload": "", "sender": OPERATOR }),
        )
        .await
        .unwrap();
    assert!(response.as_text().contains("Output: npm run build"));
}

#[tokio::test]
async fn test_send_message_tool() {
    let messenger = Arc::new(RecordingMessenger::new());
    let (gateway, _) = gateway(Arc::new(ScriptedRunner::new()), messenger.clone());

    let response = gateway
        .call_tool("send_message", &json!({ "address": TEAMMATE, "text": "deploy done" }))
        .await
        .unwrap();

    assert_eq!(
        response.as_text(),
        format!("Message sent successfully to {}", TEAMMATE)
    );
    assert_eq!(messenger.sent_to(TEAMMATE), vec!["deploy done"]);

    let err = gateway
        .call_tool("send_message", &json!({ "address": TEAMMATE, "text": "" }))
        .await
        .unwrap_err();
    assert!(failure_message(err).contains("text is required"));
}

#[tokio::test]
async fn test_get_status_tool() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .reply("git status --porcelain", " M src/lib.rs\n")
            .reply("git branch --show-current", "feature\n"),
    );
    let (gateway, _) = gateway(runner, Arc::new(RecordingMessenger::new()));

    let response = gateway.call_tool("get_status", &json!({})).await.unwrap();
    let text = response.as_text();

    assert!(text.contains("🌿 Branch: feature"));
    assert!(text.contains("📝 Changes: M src/lib.rs"));
}

#[tokio::test]
async fn test_unknown_tool() {
    let (gateway, _) = gateway(
        Arc::new(ScriptedRunner::new()),
        Arc::new(RecordingMessenger::new()),
    );

    let err = gateway.call_tool("delete_repo", &json!({})).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Tool execution failed: delete_repo: Unknown tool: delete_repo"
    );
}
