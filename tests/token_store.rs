use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use operational::{
    program, Handler, HandlerTable, InterpretError, Instruction, Instructions, Program, Recording,
    Value,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    id: u64,
    name: String,
}

fn token(id: u64, name: &str) -> Token {
    Token {
        id,
        name: name.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
struct StoreError(String);

#[derive(Debug, Clone, PartialEq, Instructions)]
#[instructions(vocabulary = "TokenStore")]
enum Tokens {
    #[output(Result<Vec<Token>, StoreError>)]
    ListTokens,
    #[output(Result<(), StoreError>)]
    DeleteToken { id: u64 },
    #[output(Result<Token, StoreError>)]
    CreateToken { name: String },
    NotifyError { error: String },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The token rules shared by both handlers below.
fn create(tokens: &mut Vec<Token>, name: &str) -> Result<Token, StoreError> {
    let length = name.chars().count();
    if length < 8 {
        return Err(StoreError("Token name must be 8 or more characters".into()));
    }
    let id = tokens.iter().map(|t| t.id).max().unwrap_or(0) + 1;
    let tail: String = name.chars().skip(length - 4).collect();
    let created = token(id, &format!("****{tail}"));
    tokens.push(created.clone());
    Ok(created)
}

fn delete(tokens: &mut Vec<Token>, id: u64) -> Result<(), StoreError> {
    let before = tokens.len();
    tokens.retain(|t| t.id != id);
    if tokens.len() == before {
        return Err(StoreError(format!("Invalid token ID: {id}")));
    }
    Ok(())
}

#[derive(Default)]
struct MemoryStore {
    tokens: Vec<Token>,
    notices: Vec<String>,
    offline: bool,
}

impl MemoryStore {
    fn with(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Handler<Tokens> for MemoryStore {
    type Error = anyhow::Error;

    async fn handle(&mut self, instruction: Tokens) -> anyhow::Result<Value> {
        if self.offline && instruction.tag() != "NotifyError" {
            return Err(anyhow!("token store is offline"));
        }
        Ok(match instruction {
            Tokens::ListTokens => Value::new(Ok::<_, StoreError>(self.tokens.clone())),
            Tokens::DeleteToken { id } => Value::new(delete(&mut self.tokens, id)),
            Tokens::CreateToken { name } => Value::new(create(&mut self.tokens, &name)),
            Tokens::NotifyError { error } => {
                self.notices.push(error);
                Value::unit()
            }
        })
    }
}

fn two_tokens() -> Vec<Token> {
    vec![token(1, "****abcd"), token(2, "****efgh")]
}

fn create_or_notify(name: &str) -> Program<Tokens, Option<Token>> {
    program! {
        created <= Tokens::create_token(name.to_string());
        match created {
            Ok(token) => Program::of(Some(token)),
            Err(error) => Tokens::notify_error(error.to_string()).map(|()| None),
        }
    }
}

#[tokio::test]
async fn list_tokens_returns_the_store_contents() {
    init_tracing();
    let mut store = MemoryStore::with(two_tokens());
    let listed = Tokens::list_tokens().run(&mut store).await.unwrap();
    assert_eq!(listed, Ok(two_tokens()));
}

#[tokio::test]
async fn short_names_are_a_result_not_a_crash() {
    let mut store = MemoryStore::with(two_tokens());
    let created = Tokens::create_token("shortnm".into())
        .run(&mut store)
        .await
        .unwrap();
    assert_eq!(
        created,
        Err(StoreError("Token name must be 8 or more characters".into()))
    );
    assert_eq!(store.tokens, two_tokens());
}

#[tokio::test]
async fn new_tokens_get_the_next_id_and_a_masked_name() {
    let mut store = MemoryStore::with(vec![token(1, "****abcd"), token(7, "****wxyz")]);
    let created = create_or_notify("my-deploy-key").run(&mut store).await.unwrap();
    assert_eq!(created, Some(token(8, "****-key")));
    assert_eq!(store.tokens.len(), 3);
}

#[tokio::test]
async fn deleting_an_unknown_id_names_it() {
    let mut store = MemoryStore::with(two_tokens());
    let deleted = Tokens::delete_token(99).run(&mut store).await.unwrap();
    let error = deleted.unwrap_err();
    assert_eq!(error.to_string(), "Invalid token ID: 99");
    assert!(error.to_string().contains("99"));

    let deleted = Tokens::delete_token(2).run(&mut store).await.unwrap();
    assert_eq!(deleted, Ok(()));
    assert_eq!(store.tokens, [token(1, "****abcd")]);
}

#[tokio::test]
async fn programs_branch_on_instruction_results() {
    let mut store = Recording::new(MemoryStore::with(two_tokens()));
    let created = create_or_notify("tiny").run(&mut store).await.unwrap();
    assert_eq!(created, None);
    assert_eq!(store.tags(), ["CreateToken", "NotifyError"]);
    assert_eq!(
        store.inner().notices,
        ["Token name must be 8 or more characters"]
    );
}

#[tokio::test]
async fn a_session_runs_in_order() {
    let session = program! {
        before <= Tokens::list_tokens();
        let count = before.as_ref().map(Vec::len).unwrap_or_default();
        created <= create_or_notify("first-long-name");
        _gone <= Tokens::delete_token(1);
        after <= Tokens::list_tokens();
        return (count, created.clone(), after.unwrap_or_default());
    };

    let mut store = Recording::new(MemoryStore::with(two_tokens()));
    let (count, created, after) = session.run(&mut store).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(created, Some(token(3, "****name")));
    assert_eq!(after, [token(2, "****efgh"), token(3, "****name")]);
    assert_eq!(
        store.tags(),
        ["ListTokens", "CreateToken", "DeleteToken", "ListTokens"]
    );
}

#[tokio::test]
async fn infrastructure_failures_stop_the_run() {
    let program = Tokens::list_tokens()
        .and_then(Tokens::create_token("never-created".into()))
        .and_then(Tokens::delete_token(1));
    let mut store = Recording::new(MemoryStore {
        offline: true,
        ..MemoryStore::with(two_tokens())
    });

    let err = program.run(&mut store).await.unwrap_err();
    assert_eq!(err.tag(), Some("ListTokens"));
    assert_eq!(
        err.handler_error().map(ToString::to_string).as_deref(),
        Some("token store is offline")
    );
    assert_eq!(store.tags(), ["ListTokens"]);
    assert_eq!(store.inner().tokens, two_tokens());
}

#[tokio::test]
async fn only_the_taken_branch_reaches_the_store() {
    let program = program! {
        listed <= Tokens::list_tokens();
        if listed.map(|tokens| tokens.is_empty()).unwrap_or(true) {
            Tokens::create_token("bootstrap-token".into()).void()
        } else {
            Tokens::delete_token(1).void()
        }
    };
    let mut store = Recording::new(MemoryStore::with(two_tokens()));
    program.run(&mut store).await.unwrap();
    assert_eq!(store.tags(), ["ListTokens", "DeleteToken"]);
}

#[tokio::test]
async fn runs_can_be_spawned() {
    let program = create_or_notify("spawned-token");
    let handle = tokio::spawn(async move {
        let mut store = MemoryStore::with(two_tokens());
        program.run(&mut store).await
    });
    let created = handle.await.unwrap().unwrap();
    assert_eq!(created, Some(token(3, "****oken")));
}

fn shared_table(tokens: Arc<Mutex<Vec<Token>>>) -> HandlerTable<Tokens, anyhow::Error> {
    let (list, remove, add) = (tokens.clone(), tokens.clone(), tokens);
    HandlerTable::new()
        .on("ListTokens", move |_| {
            let listed = list.lock().unwrap().clone();
            async move { Ok(Value::new(Ok::<_, StoreError>(listed))) }
        })
        .and_then(|table| {
            table.on("DeleteToken", move |instruction| {
                let result = match instruction {
                    Tokens::DeleteToken { id } => Ok(delete(&mut remove.lock().unwrap(), id)),
                    other => Err(anyhow!("misrouted {other:?}")),
                };
                async move { result.map(Value::new) }
            })
        })
        .and_then(|table| {
            table.on("CreateToken", move |instruction| {
                let result = match instruction {
                    Tokens::CreateToken { name } => Ok(create(&mut add.lock().unwrap(), &name)),
                    other => Err(anyhow!("misrouted {other:?}")),
                };
                async move { result.map(Value::new) }
            })
        })
        .unwrap()
}

#[tokio::test]
async fn a_handler_table_serves_the_same_programs() {
    let tokens = Arc::new(Mutex::new(two_tokens()));
    let mut table = shared_table(Arc::clone(&tokens));
    assert_eq!(table.missing(), ["NotifyError"]);

    let created = Tokens::create_token("table-made-token".into())
        .run(&mut table)
        .await
        .unwrap();
    assert_eq!(created, Ok(token(3, "****oken")));
    assert_eq!(tokens.lock().unwrap().len(), 3);

    let err = create_or_notify("short").run(&mut table).await.unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Unhandled(ref unhandled) if unhandled.tag == "NotifyError"
    ));
    assert_eq!(err.to_string(), "no handler entry for `TokenStore::NotifyError`");
}
