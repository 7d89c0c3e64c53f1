//! Terminal login prompt
//!
//! Reads from stdin and writes the dialogue to stderr so command output on
//! stdout stays clean. Failed attempts are reported and the prompt asks
//! again; an empty answer or end of input cancels.

use std::io::Write;

use storefront_auth::{AuthSession, LoginRequest, RegisterRequest};
use storefront_client::{AuthMethod, BoxFuture, Navigator, Prompt, PromptOutcome, RequestExecutor};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::debug;

pub struct TerminalPrompt {
    executor: RequestExecutor,
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalPrompt {
    /// `executor` supplies the base URL and the store credential header for
    /// the login and registration calls.
    pub fn new(executor: RequestExecutor) -> Self {
        Self {
            executor,
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Run the dialogue. With `method` set, skip the login/register choice.
    pub async fn run(&self, method: Option<AuthMethod>) -> PromptOutcome {
        let mut input = self.input.lock().await;
        loop {
            let method = match method {
                Some(method) => method,
                None => {
                    let Some(choice) =
                        ask(&mut input, "Sign in required. [l]ogin or [r]egister (Enter cancels): ")
                            .await
                    else {
                        return PromptOutcome::Cancelled;
                    };
                    match choice.to_ascii_lowercase().as_str() {
                        "l" | "login" => AuthMethod::Login,
                        "r" | "register" => AuthMethod::Registration,
                        other => {
                            eprintln!("Unknown choice: {other}");
                            continue;
                        }
                    }
                }
            };

            let attempt = match method {
                AuthMethod::Login => self.login(&mut input).await,
                AuthMethod::Registration => self.register(&mut input).await,
            };
            match attempt {
                Some(Ok(session)) => return PromptOutcome::Authenticated { session, method },
                Some(Err(e)) => eprintln!("{e}"),
                None => return PromptOutcome::Cancelled,
            }
        }
    }

    async fn login(
        &self,
        input: &mut Lines<BufReader<Stdin>>,
    ) -> Option<storefront_auth::Result<AuthSession>> {
        let email = ask(input, "Email: ").await?;
        let password = ask(input, "Password: ").await?;
        let request = LoginRequest::new(email, password);
        let headers = self.executor.headers().await;
        Some(
            storefront_auth::login(
                self.executor.http(),
                &self.executor.options().base_url,
                headers,
                &request,
            )
            .await,
        )
    }

    async fn register(
        &self,
        input: &mut Lines<BufReader<Stdin>>,
    ) -> Option<storefront_auth::Result<AuthSession>> {
        let name = ask(input, "Name: ").await?;
        let email = ask(input, "Email: ").await?;
        let password = ask(input, "Password: ").await?;
        let request = RegisterRequest::new(name, email, password);
        let headers = self.executor.headers().await;
        Some(
            storefront_auth::register(
                self.executor.http(),
                &self.executor.options().base_url,
                headers,
                &request,
            )
            .await,
        )
    }
}

/// Print `question` and read one trimmed line; `None` on empty input or EOF.
async fn ask(input: &mut Lines<BufReader<Stdin>>, question: &str) -> Option<String> {
    eprint!("{question}");
    let _ = std::io::stderr().flush();
    match input.next_line().await {
        Ok(Some(line)) => {
            let line = line.trim().to_string();
            (!line.is_empty()).then_some(line)
        }
        Ok(None) => None,
        Err(e) => {
            debug!(error = %e, "failed to read from stdin");
            None
        }
    }
}

impl Prompt for TerminalPrompt {
    fn open(&self) -> BoxFuture<'_, PromptOutcome> {
        Box::pin(self.run(None))
    }

    fn close(&self) {
        debug!("login prompt closed");
    }
}

/// Reports forced sign-outs on stderr.
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate_to_login(&self, login_path: &str) {
        eprintln!("Session ended. Sign in again at {login_path}");
    }
}
