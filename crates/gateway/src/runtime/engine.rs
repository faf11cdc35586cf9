//! The agent step engine — the bounded per-prompt loop that alternates
//! model completions with tool executions.
//!
//! One run: build the transcript, call the transport (forwarding deltas
//! into the event log), parse the output for a tool invocation, gate it
//! through the policy engine (suspending on `ask`), execute, fold the
//! result back into the transcript, repeat. Terminal assistant text ends
//! the run; transport failures fail it; `max_steps` stops it.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bc_domain::error::{Error, Result};
use bc_domain::message::Message;
use bc_domain::tool::ToolSpec;
use bc_policy::{append_rule, evaluate, Decision, Policy};
use bc_providers::{CompletionRequest, ModelTransport};
use bc_sessions::EventKind;
use bc_tools::ToolRuntime;

use super::parse::extract_tool_call;
use super::{EventSink, PermissionRequestInfo, PermissionResolver};

/// Default bound on model/tool alternations per prompt.
pub const DEFAULT_MAX_STEPS: usize = 8;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input to a single run.
pub struct RunOptions {
    pub prompt: String,
    pub model_id: String,
    pub cwd: PathBuf,
    pub max_steps: usize,
    pub policy: Policy,
    pub timeout_ms: Option<u64>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(
        prompt: impl Into<String>,
        model_id: impl Into<String>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            model_id: model_id.into(),
            cwd: cwd.into(),
            max_steps: DEFAULT_MAX_STEPS,
            policy: bc_policy::normalize(Policy::default()),
            timeout_ms: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// What a finished run hands back: the terminal text, the transcript, and
/// the working policy (with any remembered rules applied).
#[derive(Debug)]
pub struct RunOutcome {
    pub text: String,
    pub messages: Vec<Message>,
    pub policy: Policy,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run — the per-prompt loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drive one prompt to completion.
///
/// When `tools` is `None`, the engine owns a built-in-only runtime and
/// closes it on every exit path.
pub async fn run(
    transport: &dyn ModelTransport,
    tools: Option<Arc<ToolRuntime>>,
    events: Arc<dyn EventSink>,
    approvals: Option<Arc<dyn PermissionResolver>>,
    opts: RunOptions,
) -> Result<RunOutcome> {
    let (runtime, owned) = match tools {
        Some(runtime) => (runtime, false),
        None => (Arc::new(ToolRuntime::empty()), true),
    };

    let result = run_inner(transport, &runtime, &events, approvals.as_deref(), opts).await;

    if owned {
        runtime.close().await;
    }
    result
}

async fn run_inner(
    transport: &dyn ModelTransport,
    runtime: &Arc<ToolRuntime>,
    events: &Arc<dyn EventSink>,
    approvals: Option<&dyn PermissionResolver>,
    opts: RunOptions,
) -> Result<RunOutcome> {
    let specs = runtime.list_tool_specs();
    let mut messages = vec![
        Message::system(build_preamble(&specs)),
        Message::user(&opts.prompt),
    ];
    let mut policy = opts.policy.clone();

    for step in 0..opts.max_steps {
        if opts.cancel.is_cancelled() {
            return fail_run(events, Error::Cancelled).await;
        }
        if step == 0 {
            events
                .emit(EventKind::RunStarted, json!({ "modelId": opts.model_id }))
                .await;
        }

        // Deltas stream into the log while the call is in flight; joining
        // the forwarder afterwards keeps them ahead of the assistant event.
        let (delta_tx, mut delta_rx) = mpsc::unbounded_channel::<bc_providers::DeltaChunk>();
        let forwarder = {
            let sink = events.clone();
            tokio::spawn(async move {
                while let Some(chunk) = delta_rx.recv().await {
                    let mut payload = json!({ "text": chunk.text });
                    if chunk.done {
                        payload["done"] = json!(true);
                    }
                    sink.emit(EventKind::AssistantDelta, payload).await;
                }
            })
        };

        let completion = transport
            .complete(CompletionRequest {
                messages: messages.clone(),
                model_id: opts.model_id.clone(),
                tools: specs.clone(),
                timeout_ms: opts.timeout_ms,
                cancel: opts.cancel.clone(),
                on_delta: Some(delta_tx),
            })
            .await;
        let _ = forwarder.await;

        let text = match completion {
            Ok(completion) => completion.text,
            Err(err) => return fail_run(events, err).await,
        };

        // No tool call: terminal assistant answer.
        let Some(call) = extract_tool_call(&text) else {
            messages.push(Message::assistant(&text));
            events.emit(EventKind::Assistant, json!({ "text": text })).await;
            events.emit(EventKind::RunFinished, json!({})).await;
            events.emit(EventKind::Done, json!({})).await;
            return Ok(RunOutcome {
                text,
                messages,
                policy,
            });
        };

        let op = runtime.permission_for(&call.tool);
        let target = summarize_target(&call.tool, &call.arguments);
        let subject = format!("tool.{}", call.tool);
        let mut decision = evaluate(&policy, op.as_str(), Some(&subject), Some(&target));

        if decision == Decision::Ask {
            if let Some(resolver) = approvals {
                let request_id = Uuid::new_v4();
                events
                    .emit(
                        EventKind::PermissionRequest,
                        json!({
                            "requestId": request_id,
                            "op": op,
                            "tool": call.tool,
                            "target": target,
                            "args": call.arguments,
                        }),
                    )
                    .await;

                let resolution = resolver
                    .resolve(PermissionRequestInfo {
                        request_id,
                        op,
                        tool: call.tool.clone(),
                        target: target.clone(),
                        args: call.arguments.clone(),
                        created_at: chrono::Utc::now().timestamp_millis(),
                    })
                    .await;

                if let Some(rule) = &resolution.remember {
                    policy = append_rule(&policy, &rule.key, &rule.pattern, rule.decision);
                }
                events
                    .emit(
                        EventKind::PermissionResolved,
                        json!({
                            "requestId": request_id,
                            "decision": resolution.decision,
                            "remember": resolution.remember,
                        }),
                    )
                    .await;
                decision = resolution.decision;
            }
        }

        if decision != Decision::Allow {
            let message = format!("Permission {decision} for {}", call.tool);
            messages.push(Message::tool(
                json!({ "tool": call.tool, "ok": false, "error": message }).to_string(),
            ));
            events.emit(EventKind::Error, json!({ "message": message })).await;
            continue;
        }

        events
            .emit(
                EventKind::ToolCall,
                json!({ "tool": call.tool, "arguments": call.arguments }),
            )
            .await;

        match runtime
            .execute_tool(&call.tool, call.arguments.clone(), &opts.cwd)
            .await
        {
            Ok(result) => {
                messages.push(Message::assistant(
                    json!({
                        "type": "tool_call",
                        "tool": call.tool,
                        "arguments": call.arguments,
                    })
                    .to_string(),
                ));
                messages.push(Message::tool(
                    json!({ "tool": call.tool, "ok": true, "result": result }).to_string(),
                ));
                events
                    .emit(
                        EventKind::ToolResult,
                        json!({ "tool": call.tool, "result": result }),
                    )
                    .await;
            }
            Err(err) => {
                let message = err.to_string();
                messages.push(Message::tool(
                    json!({ "tool": call.tool, "ok": false, "error": message }).to_string(),
                ));
                events.emit(EventKind::Error, json!({ "message": message })).await;
            }
        }
    }

    events
        .emit(EventKind::Done, json!({ "reason": "max_steps" }))
        .await;
    Ok(RunOutcome {
        text: "Stopped: max steps reached".into(),
        messages,
        policy,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Emit the failure classification events and propagate the error.
async fn fail_run(events: &Arc<dyn EventSink>, err: Error) -> Result<RunOutcome> {
    let message = err.to_string();
    if message.contains("timeout") {
        events
            .emit(EventKind::ModelTimeout, json!({ "message": message }))
            .await;
    } else {
        events.emit(EventKind::Error, json!({ "message": message })).await;
    }
    events
        .emit(
            EventKind::RunFailed,
            json!({ "message": message, "kind": err.kind() }),
        )
        .await;
    Err(err)
}

/// The human-readable target a permission decision is made against.
fn summarize_target(tool: &str, args: &Value) -> String {
    match tool {
        "exec" => args
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        "read_file" | "write_file" => args
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        _ => args.to_string(),
    }
}

/// System preamble: agent role, the strict tool-call contract, and the
/// available tools.
fn build_preamble(specs: &[ToolSpec]) -> String {
    let mut preamble = String::from(
        "You are a coding agent operating in the user's working directory.\n\
         To invoke a tool, reply with exactly one JSON object and no surrounding prose:\n\
         {\"type\":\"tool_call\",\"tool\":\"<name>\",\"arguments\":{...}}\n\
         The arguments object must match the tool's schema. When you have the final\n\
         answer, reply with plain text instead.\n\nAvailable tools:\n",
    );
    for spec in specs {
        preamble.push_str(&format!(
            "- {} [{}]: {}\n",
            spec.name, spec.permission, spec.description
        ));
    }
    preamble
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::approval::ApprovalBroker;
    use crate::runtime::{BrokerResolver, RememberRule, Resolution};
    use bc_providers::{Completion, DeltaChunk};
    use std::collections::VecDeque;

    // ── Scripted transport ───────────────────────────────────────────

    enum Step {
        Reply { deltas: Vec<&'static str>, text: String },
        Fail(Error),
    }

    struct ScriptedTransport {
        steps: parking_lot::Mutex<VecDeque<Step>>,
        /// Response once the script is exhausted.
        fallback: String,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: parking_lot::Mutex::new(steps.into()),
                fallback: "ok".into(),
            }
        }

        fn repeating(text: impl Into<String>) -> Self {
            Self {
                steps: parking_lot::Mutex::new(VecDeque::new()),
                fallback: text.into(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ModelTransport for ScriptedTransport {
        async fn complete(&self, req: CompletionRequest) -> Result<Completion> {
            let step = self.steps.lock().pop_front();
            match step {
                Some(Step::Reply { deltas, text }) => {
                    if let Some(tx) = &req.on_delta {
                        for delta in deltas {
                            let _ = tx.send(DeltaChunk {
                                text: delta.to_string(),
                                done: false,
                            });
                        }
                    }
                    Ok(Completion { text })
                }
                Some(Step::Fail(err)) => Err(err),
                None => Ok(Completion {
                    text: self.fallback.clone(),
                }),
            }
        }
    }

    // ── Collecting sink ──────────────────────────────────────────────

    #[derive(Default)]
    struct CollectingSink {
        events: parking_lot::Mutex<Vec<(EventKind, Value)>>,
    }

    impl CollectingSink {
        fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().iter().map(|(k, _)| *k).collect()
        }

        fn payloads_of(&self, kind: EventKind) -> Vec<Value> {
            self.events
                .lock()
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl EventSink for CollectingSink {
        async fn emit(&self, kind: EventKind, payload: Value) {
            self.events.lock().push((kind, payload));
        }
    }

    struct StaticResolver(Resolution);

    #[async_trait::async_trait]
    impl PermissionResolver for StaticResolver {
        async fn resolve(&self, _request: PermissionRequestInfo) -> Resolution {
            self.0.clone()
        }
    }

    fn tool_call(tool: &str, args: Value) -> String {
        json!({"type": "tool_call", "tool": tool, "arguments": args}).to_string()
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[tokio::test]
    async fn plain_assistant_reply_streams_and_finishes() {
        let transport = ScriptedTransport::new(vec![Step::Reply {
            deltas: vec!["hello ", "world"],
            text: "final answer".into(),
        }]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let outcome = run(
            &transport,
            None,
            sink.clone(),
            None,
            RunOptions::new("hi", "test-model", cwd.path()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "final answer");
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::RunStarted,
                EventKind::AssistantDelta,
                EventKind::AssistantDelta,
                EventKind::Assistant,
                EventKind::RunFinished,
                EventKind::Done,
            ]
        );
        let deltas = sink.payloads_of(EventKind::AssistantDelta);
        assert_eq!(deltas[0]["text"], "hello ");
        assert_eq!(deltas[1]["text"], "world");
        assert_eq!(sink.payloads_of(EventKind::Assistant)[0]["text"], "final answer");
        // Transcript: system, user, assistant.
        assert_eq!(outcome.messages.len(), 3);
    }

    #[tokio::test]
    async fn fenced_tool_call_executes_then_finishes() {
        let transport = ScriptedTransport::new(vec![
            Step::Reply {
                deltas: vec![],
                text: format!("```\n{}\n```", tool_call("list_files", json!({}))),
            },
            Step::Reply {
                deltas: vec![],
                text: "ok".into(),
            },
        ]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();
        std::fs::write(cwd.path().join("a.txt"), "x").unwrap();

        let outcome = run(
            &transport,
            None,
            sink.clone(),
            None,
            RunOptions::new("list", "test-model", cwd.path()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "ok");
        let calls = sink.payloads_of(EventKind::ToolCall);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["tool"], "list_files");
        assert_eq!(calls[0]["arguments"], json!({}));
        let results = sink.payloads_of(EventKind::ToolResult);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["result"]["total"], 1);
    }

    #[tokio::test]
    async fn missing_arguments_execute_with_empty_object() {
        let transport = ScriptedTransport::new(vec![
            Step::Reply {
                deltas: vec![],
                text: r#"{"type":"tool_call","tool":"list_files"}"#.into(),
            },
            Step::Reply {
                deltas: vec![],
                text: "ok".into(),
            },
        ]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let outcome = run(
            &transport,
            None,
            sink.clone(),
            None,
            RunOptions::new("list", "test-model", cwd.path()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "ok");
        assert_eq!(sink.payloads_of(EventKind::ToolCall)[0]["arguments"], json!({}));
        assert_eq!(sink.payloads_of(EventKind::ToolResult).len(), 1);
    }

    #[tokio::test]
    async fn transport_timeout_fails_the_run() {
        let transport = ScriptedTransport::new(vec![Step::Fail(Error::ModelTimeout(1000))]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let err = run(
            &transport,
            None,
            sink.clone(),
            None,
            RunOptions::new("hi", "test-model", cwd.path()),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("timeout"));
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::RunStarted,
                EventKind::ModelTimeout,
                EventKind::RunFailed,
            ]
        );
        assert_eq!(sink.payloads_of(EventKind::RunFailed)[0]["kind"], "model_timeout");
    }

    #[tokio::test]
    async fn ask_with_broker_timeout_auto_denies_until_max_steps() {
        // The model keeps demanding a destructive command; nobody replies.
        let transport =
            ScriptedTransport::repeating(tool_call("exec", json!({"command": "rm -rf /"})));
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let broker = Arc::new(ApprovalBroker::new(std::time::Duration::from_millis(20)));
        let resolver = Arc::new(BrokerResolver {
            broker: broker.clone(),
            session_id: "s1".into(),
        });

        let mut opts = RunOptions::new("destroy", "test-model", cwd.path());
        opts.max_steps = 2;

        let outcome = run(&transport, None, sink.clone(), Some(resolver), opts)
            .await
            .unwrap();

        assert_eq!(outcome.text, "Stopped: max steps reached");
        assert_eq!(sink.payloads_of(EventKind::PermissionRequest).len(), 2);
        let resolved = sink.payloads_of(EventKind::PermissionResolved);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|p| p["decision"] == "deny"));
        // Denied calls never execute.
        assert!(sink.payloads_of(EventKind::ToolCall).is_empty());
        assert_eq!(
            sink.payloads_of(EventKind::Done)[0]["reason"],
            "max_steps"
        );
        assert!(broker.list("s1").is_empty());
    }

    #[tokio::test]
    async fn remember_rule_amends_the_working_policy_only() {
        let transport = ScriptedTransport::new(vec![
            Step::Reply {
                deltas: vec![],
                text: tool_call("exec", json!({"command": "git status"})),
            },
            Step::Reply {
                deltas: vec![],
                text: "clean tree".into(),
            },
        ]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let resolver = Arc::new(StaticResolver(Resolution {
            decision: Decision::Allow,
            remember: Some(RememberRule {
                key: "exec".into(),
                pattern: "git status".into(),
                decision: Decision::Allow,
            }),
        }));

        let opts = RunOptions::new("status?", "test-model", cwd.path());
        let daemon_policy = opts.policy.clone();

        let outcome = run(&transport, None, sink.clone(), Some(resolver), opts)
            .await
            .unwrap();

        assert_eq!(outcome.text, "clean tree");
        // The run's working policy now allows the remembered pattern...
        assert_eq!(
            evaluate(&outcome.policy, "exec", None, Some("git status")),
            Decision::Allow
        );
        // ...while the policy the daemon held is unchanged.
        assert_eq!(
            evaluate(&daemon_policy, "exec", None, Some("git status")),
            Decision::Ask
        );
        let resolved = sink.payloads_of(EventKind::PermissionResolved);
        assert_eq!(resolved[0]["decision"], "allow");
        assert_eq!(resolved[0]["remember"]["pattern"], "git status");
    }

    #[tokio::test]
    async fn ask_without_resolver_denies_without_executing() {
        let transport = ScriptedTransport::new(vec![
            Step::Reply {
                deltas: vec![],
                text: tool_call("exec", json!({"command": "rm -rf /"})),
            },
            Step::Reply {
                deltas: vec![],
                text: "giving up".into(),
            },
        ]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let outcome = run(
            &transport,
            None,
            sink.clone(),
            None,
            RunOptions::new("destroy", "test-model", cwd.path()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "giving up");
        assert!(sink.payloads_of(EventKind::ToolCall).is_empty());
        let errors = sink.payloads_of(EventKind::Error);
        assert!(errors[0]["message"]
            .as_str()
            .unwrap()
            .contains("Permission ask for exec"));
        // The model saw the denial as a tool-role message.
        assert!(outcome
            .messages
            .iter()
            .any(|m| m.content.contains("Permission ask for exec")));
    }

    #[tokio::test]
    async fn max_steps_executes_exactly_k_tools() {
        let transport = ScriptedTransport::repeating(tool_call("list_files", json!({})));
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let mut opts = RunOptions::new("loop forever", "test-model", cwd.path());
        opts.max_steps = 3;

        let outcome = run(&transport, None, sink.clone(), None, opts).await.unwrap();

        assert_eq!(outcome.text, "Stopped: max steps reached");
        assert_eq!(sink.payloads_of(EventKind::ToolCall).len(), 3);
        assert_eq!(sink.payloads_of(EventKind::ToolResult).len(), 3);
        assert_eq!(sink.payloads_of(EventKind::Done)[0]["reason"], "max_steps");
    }

    #[tokio::test]
    async fn tool_failure_folds_into_conversation_and_continues() {
        let transport = ScriptedTransport::new(vec![
            Step::Reply {
                deltas: vec![],
                text: tool_call("read_file", json!({"path": "../escape.txt"})),
            },
            Step::Reply {
                deltas: vec![],
                text: "could not read that".into(),
            },
        ]);
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let outcome = run(
            &transport,
            None,
            sink.clone(),
            None,
            RunOptions::new("read", "test-model", cwd.path()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "could not read that");
        // The escape surfaced as a tool-call + error, then the run recovered.
        assert_eq!(sink.payloads_of(EventKind::ToolCall).len(), 1);
        assert!(sink.payloads_of(EventKind::ToolResult).is_empty());
        let errors = sink.payloads_of(EventKind::Error);
        assert!(errors[0]["message"].as_str().unwrap().contains("outside"));
        assert!(outcome
            .messages
            .iter()
            .any(|m| m.content.contains("\"ok\":false")));
    }

    #[tokio::test]
    async fn cancelled_before_first_step_fails_as_cancelled() {
        let transport = ScriptedTransport::repeating("never reached");
        let sink = Arc::new(CollectingSink::default());
        let cwd = tempfile::TempDir::new().unwrap();

        let opts = RunOptions::new("hi", "test-model", cwd.path());
        opts.cancel.cancel();

        let err = run(&transport, None, sink.clone(), None, opts).await.unwrap_err();
        assert!(err.to_string().contains("cancel"));
        assert_eq!(sink.payloads_of(EventKind::RunFailed)[0]["kind"], "cancelled");
    }

    #[test]
    fn summarize_targets() {
        assert_eq!(
            summarize_target("exec", &json!({"command": "git status"})),
            "git status"
        );
        assert_eq!(
            summarize_target("read_file", &json!({"path": "src/main.rs"})),
            "src/main.rs"
        );
        assert_eq!(
            summarize_target("grep", &json!({"pattern": "todo"})),
            r#"{"pattern":"todo"}"#
        );
    }

    #[test]
    fn preamble_lists_tools_and_contract() {
        let runtime = ToolRuntime::empty();
        let preamble = build_preamble(&runtime.list_tool_specs());
        assert!(preamble.contains("\"type\":\"tool_call\""));
        assert!(preamble.contains("- exec [exec]:"));
        assert!(preamble.contains("- read_file [read]:"));
    }
}
