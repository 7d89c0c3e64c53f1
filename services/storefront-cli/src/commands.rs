//! Command parsing and dispatch

use std::sync::Arc;

use anyhow::{Context, anyhow};
use reqwest::Method;
use storefront_auth::{CredentialStore, TokenSlot};
use storefront_client::{
    AdminError, AuthChallengeCoordinator, AuthMethod, Cart, CartApi, ExecutorOptions, Prompt,
    PromptOutcome, RequestError, RequestExecutor, SellerAdmin,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::prompt::{PrintNavigator, TerminalPrompt};

pub const USAGE: &str = "usage:
  storefront [--config <path>] <command>

customer commands:
  storefront cart show
  storefront cart add <product_code> <park_code> [amount]
  storefront cart update <product_id> <amount>
  storefront cart remove <product_id>
  storefront login
  storefront register
  storefront logout

seller admin commands:
  storefront admin token <seller_token>
  storefront admin me
  storefront admin get <path>
  storefront admin logout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Customer(CustomerCommand),
    Admin(AdminCommand),
}

/// Storefront commands; run on the customer token with the login prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerCommand {
    CartShow,
    CartAdd {
        product_code: String,
        park_code: String,
        amount: u32,
    },
    CartUpdate {
        product_id: i64,
        amount: u32,
    },
    CartRemove {
        product_id: i64,
    },
    Login,
    Register,
    Logout,
}

/// Seller admin commands; any rejection signs the seller out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Token(String),
    Me,
    Get(String),
    Logout,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] | ["help" | "--help" | "-h"] => Command::Help,
            ["cart"] | ["cart", "show"] => Command::Customer(CustomerCommand::CartShow),
            ["cart", "add", product_code, park_code, rest @ ..] => {
                let amount = match rest {
                    [] => 1,
                    [amount] => parse_number(amount, "amount")?,
                    _ => return Err(Error::Usage("too many arguments to cart add".into())),
                };
                Command::Customer(CustomerCommand::CartAdd {
                    product_code: product_code.to_string(),
                    park_code: park_code.to_string(),
                    amount,
                })
            }
            ["cart", "update", product_id, amount] => Command::Customer(CustomerCommand::CartUpdate {
                product_id: parse_number(product_id, "product_id")?,
                amount: parse_number(amount, "amount")?,
            }),
            ["cart", "remove", product_id] => Command::Customer(CustomerCommand::CartRemove {
                product_id: parse_number(product_id, "product_id")?,
            }),
            ["login"] => Command::Customer(CustomerCommand::Login),
            ["register"] => Command::Customer(CustomerCommand::Register),
            ["logout"] => Command::Customer(CustomerCommand::Logout),
            ["admin", "token", token] => Command::Admin(AdminCommand::Token(token.to_string())),
            ["admin", "me"] => Command::Admin(AdminCommand::Me),
            ["admin", "get", path] => Command::Admin(AdminCommand::Get(path.to_string())),
            ["admin", "logout"] => Command::Admin(AdminCommand::Logout),
            other => return Err(Error::Usage(format!("unknown command: {}", other.join(" ")))),
        };
        Ok(command)
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Usage(format!("{name} must be a number, got: {value}")))
}

/// Remove `flag <value>` from `args` and return the value.
pub fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let index = args.iter().position(|a| a == flag)?;
    if index + 1 >= args.len() {
        args.remove(index);
        return None;
    }
    let value = args.remove(index + 1);
    args.remove(index);
    Some(value)
}

pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Customer(command) => {
            let (http, store) = connect(config).await?;
            run_customer(command, config, http, store).await
        }
        Command::Admin(command) => {
            let (http, store) = connect(config).await?;
            run_admin(command, config, http, store).await
        }
    }
}

/// Open the credential file, apply a configured store credential, build the HTTP client.
async fn connect(config: &Config) -> anyhow::Result<(reqwest::Client, Arc<CredentialStore>)> {
    let path = &config.storage.credentials_path;
    let store = CredentialStore::load(path.clone())
        .await
        .with_context(|| format!("failed to open credential file {}", path.display()))?;
    if let Some(credential) = &config.api.store_credential {
        if store.store_credential().await.as_deref() != Some(credential.expose()) {
            store
                .set_store_credential(credential.expose().to_string())
                .await
                .context("failed to save store credential")?;
        }
    }

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    Ok((http, Arc::new(store)))
}

async fn run_customer(
    command: CustomerCommand,
    config: &Config,
    http: reqwest::Client,
    store: Arc<CredentialStore>,
) -> anyhow::Result<()> {
    let mut options = ExecutorOptions::challenge(&config.api.base_url);
    options.timeout = config.timeout();
    let executor = RequestExecutor::new(http, store.clone(), options);
    let prompt = Arc::new(TerminalPrompt::new(executor.clone()));
    let coordinator = AuthChallengeCoordinator::new(store.clone(), prompt.clone(), TokenSlot::Customer);
    let cart = CartApi::new(executor);

    let result = match command {
        CustomerCommand::CartShow => cart.load().await,
        CustomerCommand::CartAdd {
            product_code,
            park_code,
            amount,
        } => cart.add_product(&product_code, &park_code, amount).await,
        CustomerCommand::CartUpdate { product_id, amount } => {
            cart.update_amount(product_id, amount).await
        }
        CustomerCommand::CartRemove { product_id } => cart.remove_item(product_id).await,
        CustomerCommand::Login => return sign_in(&store, &prompt, &cart, AuthMethod::Login).await,
        CustomerCommand::Register => {
            return sign_in(&store, &prompt, &cart, AuthMethod::Registration).await;
        }
        CustomerCommand::Logout => {
            store
                .clear_token(TokenSlot::Customer)
                .await
                .context("failed to clear customer token")?;
            println!("Signed out.");
            return Ok(());
        }
    };

    match settle_cart(&coordinator, result).await? {
        Some(cart) => print_cart(&cart),
        None => println!("Cancelled."),
    }
    Ok(())
}

async fn sign_in(
    store: &CredentialStore,
    prompt: &TerminalPrompt,
    cart: &CartApi,
    method: AuthMethod,
) -> anyhow::Result<()> {
    let outcome = prompt.run(Some(method)).await;
    prompt.close();
    finish_sign_in(store, cart, outcome).await
}

/// Save the customer token and show the cart it unlocks. A cart that fails to
/// load does not fail the sign-in.
async fn finish_sign_in(
    store: &CredentialStore,
    cart: &CartApi,
    outcome: PromptOutcome,
) -> anyhow::Result<()> {
    match outcome {
        PromptOutcome::Authenticated { session, method } => {
            store
                .set_token(TokenSlot::Customer, session.access_token.expose().to_string())
                .await
                .context("failed to save customer token")?;
            info!(via = method.label(), "customer token saved");
            match session.name {
                Some(name) => println!("Signed in as {name}."),
                None => println!("Signed in."),
            }
            match cart.load().await {
                Ok(cart) => print_cart(&cart),
                Err(e) => warn!(error = %e, "failed to load cart after sign-in"),
            }
        }
        PromptOutcome::Cancelled => println!("Cancelled."),
    }
    Ok(())
}

/// Route an authentication failure through the login prompt and decode the
/// replayed call's cart. `None` when the user cancelled.
async fn settle_cart(
    coordinator: &AuthChallengeCoordinator,
    result: storefront_client::Result<Cart>,
) -> anyhow::Result<Option<Cart>> {
    let error = match result {
        Ok(cart) => return Ok(Some(cart)),
        Err(error) => error,
    };
    match coordinator.settle(Err(error)).await {
        Ok(Some(payload)) => Ok(Some(Cart::from_payload(payload).map_err(report)?)),
        Ok(None) => Ok(None),
        Err(error) => Err(report(error)),
    }
}

fn report(error: RequestError) -> anyhow::Error {
    match error.user_message() {
        Some(message) => anyhow!(message),
        None => anyhow!("sign-in was not accepted for this request"),
    }
}

fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for item in &cart.items {
        println!(
            "{:>6}  {:<32} {:>3} x {:>10} = {:>10}",
            item.product_id,
            item.product_name,
            item.amount,
            format_cents(item.price),
            format_cents(item.price * i64::from(item.amount)),
        );
    }
    println!("{} item(s), total {}", cart.item_count(), format_cents(cart.total_cents()));
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

async fn run_admin(
    command: AdminCommand,
    config: &Config,
    http: reqwest::Client,
    store: Arc<CredentialStore>,
) -> anyhow::Result<()> {
    let mut options = ExecutorOptions::force_reauth(&config.api.base_url, &config.admin.login_path);
    options.timeout = config.timeout();
    let executor = RequestExecutor::with_navigator(http, store.clone(), options, Arc::new(PrintNavigator));
    let admin = SellerAdmin::new(executor);

    match command {
        AdminCommand::Token(token) => {
            store
                .set_token(TokenSlot::Seller, token)
                .await
                .context("failed to save seller token")?;
            print_profile(&admin).await
        }
        AdminCommand::Me => print_profile(&admin).await,
        AdminCommand::Get(path) => {
            admin.ensure_session().await.map_err(admin_report)?;
            let payload = admin
                .request(Method::GET, &path, None)
                .await
                .map_err(admin_report)?;
            match payload.into_json() {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("(no content)"),
            }
            Ok(())
        }
        AdminCommand::Logout => {
            admin.logout().await.map_err(admin_report)?;
            Ok(())
        }
    }
}

async fn print_profile(admin: &SellerAdmin) -> anyhow::Result<()> {
    let profile = admin.load_seller_info().await.map_err(admin_report)?;
    println!("Seller: {}", profile.username);
    if let Some(store_name) = &profile.store_name {
        println!("Store:  {store_name}");
    }
    Ok(())
}

fn admin_report(error: AdminError) -> anyhow::Error {
    match error {
        AdminError::Request(error) => report(error),
        other => anyhow!(other),
    }
}
