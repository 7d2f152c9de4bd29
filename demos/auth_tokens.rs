// Interactive token manager.
//
// The whole session is one program over the `App` vocabulary. It never
// touches stdin, stdout or the token list itself: the `Terminal` handler
// below does, and a test could run the very same `session()` against a
// scripted handler instead.
//
//     RUST_LOG=operational=debug cargo run --example auth_tokens

use std::time::Duration;

use anyhow::{anyhow, Context};
use operational::{
    async_trait, program, Handler, InterpreterConfig, Instructions, Metrics, Program, Trace, Value,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    id: u64,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
struct StoreError(String);

/// What the user asked for at the main prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UiAction {
    Show,
    Delete(u64),
    Create,
    Exit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Instructions)]
#[instructions(vocabulary = "AuthTokens")]
enum App {
    // Token store
    #[output(Result<Vec<Token>, StoreError>)]
    ListTokens,
    #[output(Result<(), StoreError>)]
    DeleteToken { id: u64 },
    #[output(Result<Token, StoreError>)]
    CreateToken { name: String },

    // User interface
    NotifyError { error: String },
    #[output(Result<UiAction, String>)]
    AwaitUiAction,
    #[output(bool)]
    ConfirmDeletion { id: u64 },
    #[output(String)]
    PromptNewTokenName,
    DisplayNewToken { token: Token },
    DisplayAllTokens,
}

fn session() -> Program<App, ()> {
    program! {
        listed <= App::list_tokens();
        match listed {
            Err(error) => App::notify_error(error.to_string()),
            Ok(_) => actions(),
        }
    }
}

/// Wait for an action, carry it out, repeat until the user quits.
fn actions() -> Program<App, ()> {
    program! {
        action <= App::await_ui_action();
        match action {
            Ok(UiAction::Exit) => Program::of(()),
            Ok(UiAction::Show) => App::display_all_tokens().chain(|()| actions()),
            Ok(UiAction::Create) => create().chain(|()| actions()),
            Ok(UiAction::Delete(id)) => delete(id).chain(|()| actions()),
            Ok(UiAction::Unknown(help)) | Err(help) => {
                App::notify_error(help).chain(|()| actions())
            }
        }
    }
}

fn delete(id: u64) -> Program<App, ()> {
    program! {
        confirmed <= App::confirm_deletion(id);
        if confirmed {
            program! {
                deleted <= App::delete_token(id);
                match deleted {
                    Ok(()) => Program::of(()),
                    Err(error) => App::notify_error(error.to_string()),
                }
            }
        } else {
            Program::of(())
        }
    }
}

fn create() -> Program<App, ()> {
    program! {
        name <= App::prompt_new_token_name();
        created <= App::create_token(name);
        match created {
            Ok(token) => App::display_new_token(token),
            Err(error) => App::notify_error(error.to_string()),
        }
    }
}

struct TokenStore {
    tokens: Vec<Token>,
}

impl TokenStore {
    fn seeded() -> Self {
        let tokens = [(1, "****abcd"), (2, "****efgh"), (3, "****ijkl"), (4, "****mnop")]
            .into_iter()
            .map(|(id, name)| Token {
                id,
                name: name.to_string(),
            })
            .collect();
        Self { tokens }
    }

    fn create(&mut self, name: &str) -> Result<Token, StoreError> {
        let length = name.chars().count();
        if length < 8 {
            return Err(StoreError(
                "Token name must be 8 or more characters".to_string(),
            ));
        }
        let id = self.tokens.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let tail: String = name.chars().skip(length - 4).collect();
        let token = Token {
            id,
            name: format!("****{tail}"),
        };
        self.tokens.push(token.clone());
        Ok(token)
    }

    fn remove(&mut self, id: u64) -> Result<(), StoreError> {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.id != id);
        if self.tokens.len() == before {
            return Err(StoreError(format!("Invalid token ID: {id}")));
        }
        Ok(())
    }
}

const MENU: &str = "What would you like to do?
S: show all tokens
C: create a token
D: delete a token
Q: quit
action #> ";

struct Terminal {
    store: TokenStore,
    input: Lines<BufReader<Stdin>>,
    output: Stdout,
    work: Duration,
}

impl Terminal {
    fn new(store: TokenStore) -> Self {
        Self {
            store,
            input: BufReader::new(tokio::io::stdin()).lines(),
            output: tokio::io::stdout(),
            work: Duration::from_millis(500),
        }
    }

    async fn say(&mut self, text: &str) -> anyhow::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    /// Prompt and read one trimmed line; `None` once stdin is closed.
    async fn ask(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        self.say(prompt).await?;
        let line = self.input.next_line().await.context("reading stdin")?;
        Ok(line.map(|line| line.trim().to_string()))
    }

    async fn await_action(&mut self) -> anyhow::Result<Result<UiAction, String>> {
        let Some(input) = self.ask(MENU).await? else {
            return Ok(Ok(UiAction::Exit));
        };
        let action = match input.to_lowercase().as_str() {
            "s" => UiAction::Show,
            "c" => UiAction::Create,
            "q" => UiAction::Exit,
            "d" => {
                let Some(id) = self.ask("Which token id? #> ").await? else {
                    return Ok(Ok(UiAction::Exit));
                };
                match id.parse() {
                    Ok(id) => UiAction::Delete(id),
                    Err(_) => UiAction::Unknown(format!("{id} is not a valid ID")),
                }
            }
            _ => UiAction::Unknown(format!("{input} is not a valid action")),
        };
        Ok(Ok(action))
    }
}

#[async_trait]
impl Handler<App> for Terminal {
    type Error = anyhow::Error;

    async fn handle(&mut self, instruction: App) -> anyhow::Result<Value> {
        Ok(match instruction {
            App::ListTokens => Value::new(Ok::<_, StoreError>(self.store.tokens.clone())),
            App::DeleteToken { id } => Value::new(self.store.remove(id)),
            App::CreateToken { name } => {
                // Token creation talks to a slow backend in real deployments.
                tokio::time::sleep(self.work).await;
                Value::new(self.store.create(&name))
            }
            App::NotifyError { error } => {
                eprintln!("Error: {error}");
                Value::unit()
            }
            App::AwaitUiAction => Value::new(self.await_action().await?),
            App::ConfirmDeletion { id } => {
                let prompt = format!("Are you sure you want to delete token {id}? [Y/N] #> ");
                let answer = self.ask(&prompt).await?;
                Value::new(answer.is_some_and(|a| a.eq_ignore_ascii_case("y")))
            }
            App::PromptNewTokenName => {
                let name = self
                    .ask("New token name? #> ")
                    .await?
                    .ok_or_else(|| anyhow!("stdin closed while waiting for a token name"))?;
                Value::new(name)
            }
            App::DisplayNewToken { token } => {
                self.say(&format!("New token created: {} {}\n", token.id, token.name))
                    .await?;
                Value::unit()
            }
            App::DisplayAllTokens => {
                let listing: String = self
                    .store
                    .tokens
                    .iter()
                    .map(|t| format!("{} {}\n", t.id, t.name))
                    .collect();
                self.say(&listing).await?;
                Value::unit()
            }
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut handler = Metrics::new(Trace::with_prefix(
        Terminal::new(TokenStore::seeded()),
        "auth_tokens",
    ));
    let config = InterpreterConfig::new().with_label("auth-tokens");

    session().run_with(&mut handler, &config).await?;

    info!(
        handled = handler.handled_count(),
        failed = handler.error_count(),
        "session finished"
    );
    Ok(())
}
