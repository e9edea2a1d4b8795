//! Interactive storefront shell.
//!
//! One shell run is one page lifetime: the session is restored once at
//! start-up, protected locations go through the route guard, and a login
//! started by a guard redirect returns to the location that was refused.

use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::debug;

use emporium_core::{AddressId, AddressType, ProductId};
use emporium_storefront::account::{AddressInput, ReviewInput};
use emporium_storefront::auth::{LoginForm, RegisterForm};
use emporium_storefront::guard::return_target;
use emporium_storefront::{
    ApiError, BootstrapOutcome, BootstrapPhase, Navigation, Storefront,
};

use super::{CliError, say};
use crate::render;

const HELP: &str = "\
Commands:
  login <user-or-email> <password>      register <username> <email> <password>
  logout                                whoami
  forgot <email>                        open <path>
  products [search terms]               product <id>
  cart                                  cart-add <product-id>
  cart-inc <product-id>                 cart-dec <product-id>
  cart-rm <product-id>                  wishlist
  wish <product-id>                     addresses
  address-add name|phone|pincode|locality|address|city|state|home|work[|alt-phone]
  address-rm <address-id>               review <product-id> <1-5> <comment>
  checkout <address-id>                 help
  quit";

/// A parsed shell line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Quit,
    Login { user: String, password: String },
    Register { username: String, email: String, password: String },
    Logout,
    WhoAmI,
    Forgot { email: String },
    Open { path: String },
    Products { search: Option<String> },
    Product { id: String },
    Cart,
    CartAdd { id: String },
    CartInc { id: String },
    CartDec { id: String },
    CartRemove { id: String },
    Wishlist,
    Wish { id: String },
    Addresses,
    AddressAdd { fields: Vec<String> },
    AddressRemove { id: String },
    Review { id: String, rating: u8, comment: String },
    Checkout { address: String },
}

fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let one = |usage: &str| -> Result<String, String> {
        match args.as_slice() {
            [arg] => Ok((*arg).to_string()),
            _ => Err(format!("usage: {name} {usage}")),
        }
    };

    let command = match name {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "login" => match args.as_slice() {
            [user, password] => Command::Login {
                user: (*user).to_string(),
                password: (*password).to_string(),
            },
            _ => return Err("usage: login <user-or-email> <password>".to_string()),
        },
        "register" => match args.as_slice() {
            [username, email, password] => Command::Register {
                username: (*username).to_string(),
                email: (*email).to_string(),
                password: (*password).to_string(),
            },
            _ => return Err("usage: register <username> <email> <password>".to_string()),
        },
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "forgot" => Command::Forgot { email: one("<email>")? },
        "open" => Command::Open { path: one("<path>")? },
        "products" => Command::Products {
            search: (!rest.is_empty()).then(|| rest.to_string()),
        },
        "product" => Command::Product { id: one("<id>")? },
        "cart" => Command::Cart,
        "cart-add" => Command::CartAdd { id: one("<product-id>")? },
        "cart-inc" => Command::CartInc { id: one("<product-id>")? },
        "cart-dec" => Command::CartDec { id: one("<product-id>")? },
        "cart-rm" => Command::CartRemove { id: one("<product-id>")? },
        "wishlist" => Command::Wishlist,
        "wish" => Command::Wish { id: one("<product-id>")? },
        "addresses" => Command::Addresses,
        "address-add" => Command::AddressAdd {
            fields: rest.split('|').map(|f| f.trim().to_string()).collect(),
        },
        "address-rm" => Command::AddressRemove { id: one("<address-id>")? },
        "review" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let (Some(id), Some(rating), Some(comment)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err("usage: review <product-id> <1-5> <comment>".to_string());
            };
            let rating = rating
                .parse()
                .map_err(|_| "rating must be a number from 1 to 5".to_string())?;
            Command::Review {
                id: id.to_string(),
                rating,
                comment: comment.trim().to_string(),
            }
        }
        "checkout" => Command::Checkout { address: one("<address-id>")? },
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(command)
}

fn address_input(fields: &[String]) -> Result<AddressInput, String> {
    let [name, phone, pincode, locality, address, city, state, kind, rest @ ..] = fields else {
        return Err(
            "usage: address-add name|phone|pincode|locality|address|city|state|home|work[|alt-phone]"
                .to_string(),
        );
    };
    let address_type: AddressType = kind
        .parse()
        .map_err(|_| format!("address type must be home or work, got '{kind}'"))?;
    Ok(AddressInput {
        name: name.clone(),
        phone: phone.clone(),
        pincode: pincode.clone(),
        locality: locality.clone(),
        address: address.clone(),
        city: city.clone(),
        state: state.clone(),
        address_type,
        alternate_phone: rest.first().filter(|p| !p.is_empty()).cloned(),
    })
}

/// Shell state that lives for one run.
struct Shell<'a> {
    storefront: &'a Storefront,
    /// Location to open after the next successful login.
    return_to: Option<String>,
}

impl Shell<'_> {
    /// Navigate through the route guard.
    fn open(&mut self, path: &str) {
        match self.storefront.guard().check(path) {
            Navigation::Allow => say(format!("-> {path}")),
            Navigation::Redirect(location) => {
                self.return_to = return_target(&location);
                say(format!("Please log in to continue -> {location}"));
            }
        }
    }

    fn after_login(&mut self, username: &str) {
        say(format!("Welcome, {username}"));
        if let Some(target) = self.return_to.take() {
            self.open(&target);
        }
    }

    async fn execute(&mut self, command: Command) -> Result<(), ApiError> {
        let storefront = self.storefront;
        let account = storefront.account();

        match command {
            Command::Help => say(HELP),
            Command::Quit => {}
            Command::Login { user, password } => {
                let session = storefront
                    .auth()
                    .login(&LoginForm {
                        username_or_email: user,
                        password: SecretString::from(password),
                    })
                    .await?;
                self.after_login(&session.identity.username);
            }
            Command::Register {
                username,
                email,
                password,
            } => {
                let session = storefront
                    .auth()
                    .register(&RegisterForm {
                        username,
                        email,
                        password: SecretString::from(password),
                    })
                    .await?;
                self.after_login(&session.identity.username);
            }
            Command::Logout => {
                let message = storefront.auth().logout().await?;
                say(message.unwrap_or_else(|| "Logged out".to_string()));
            }
            Command::WhoAmI => match storefront.session().get() {
                Some(session) => say(render::identity(&session)),
                None => say("Not logged in"),
            },
            Command::Forgot { email } => {
                let message = storefront.auth().forgot_password(&email).await?;
                say(message.unwrap_or_else(|| "Check your inbox for a reset link".to_string()));
            }
            Command::Open { path } => self.open(&path),
            Command::Products { search } => {
                let mut filter = emporium_storefront::catalog::ProductFilter::default();
                filter.search = search;
                let page = storefront.search().search(&filter).await?;
                for product in &page.filtered_products {
                    let marker = if storefront
                        .session()
                        .get()
                        .is_some_and(|s| s.in_wishlist(&product.id))
                    {
                        "*"
                    } else {
                        " "
                    };
                    say(format!("{marker} {}", render::product_line(product)));
                }
            }
            Command::Product { id } => {
                let product = storefront.catalog().product(&ProductId::new(id)).await?;
                say(render::product_detail(&product, chrono::Utc::now()));
            }
            Command::Cart => self.with_guard("/cart", async {
                let view = account.cart().await?;
                say(render::cart(&view));
                Ok(())
            })
            .await?,
            Command::CartAdd { id } => {
                let message = account.add_to_cart(&ProductId::new(id)).await?;
                say(message.unwrap_or_else(|| "Added to cart".to_string()));
            }
            Command::CartInc { id } => {
                account.increment(&ProductId::new(id)).await?;
                say("Quantity updated");
            }
            Command::CartDec { id } => {
                account.decrement(&ProductId::new(id)).await?;
                say("Quantity updated");
            }
            Command::CartRemove { id } => {
                let message = account.remove_from_cart(&ProductId::new(id)).await?;
                say(message.unwrap_or_else(|| "Removed from cart".to_string()));
            }
            Command::Wishlist => self.with_guard("/myProfile/wishlist", async {
                let products = account.wishlist().await?;
                if products.is_empty() {
                    say("Your wishlist is empty");
                }
                for product in &products {
                    say(render::product_line(product));
                }
                Ok(())
            })
            .await?,
            Command::Wish { id } => {
                let listed = account.toggle_wishlist(&ProductId::new(id)).await?;
                say(if listed { "Added to wishlist" } else { "Removed from wishlist" });
            }
            Command::Addresses => self.with_guard("/myProfile/addresses", async {
                say(render::addresses(&account.addresses()?));
                Ok(())
            })
            .await?,
            Command::AddressAdd { fields } => {
                let input = address_input(&fields).map_err(ApiError::InvalidInput)?;
                let message = account.add_address(&input).await?;
                say(message.unwrap_or_else(|| "Address saved".to_string()));
            }
            Command::AddressRemove { id } => {
                let message = account.delete_address(&AddressId::new(id)).await?;
                say(message.unwrap_or_else(|| "Address deleted".to_string()));
            }
            Command::Review { id, rating, comment } => {
                let input = ReviewInput {
                    num_rating: rating,
                    comment,
                };
                let message = account.submit_review(&ProductId::new(id), &input).await?;
                say(message.unwrap_or_else(|| "Thanks for your review".to_string()));
            }
            Command::Checkout { address } => self.with_guard("/checkout", async {
                let session_id = account.create_checkout_session(&AddressId::new(address)).await?;
                say(format!("Checkout session {session_id} created, continue to payment"));
                Ok(())
            })
            .await?,
        }
        Ok(())
    }

    /// Run `page` only if the guard lets us open `path`.
    async fn with_guard(
        &mut self,
        path: &str,
        page: impl Future<Output = Result<(), ApiError>>,
    ) -> Result<(), ApiError> {
        if let Navigation::Redirect(location) = self.storefront.guard().check(path) {
            self.return_to = return_target(&location);
            say(format!("Please log in to continue -> {location}"));
            return Ok(());
        }
        page.await
    }
}

/// Print a progress line while the session is being restored.
async fn show_restore_progress(mut phase: watch::Receiver<BootstrapPhase>) {
    while phase.changed().await.is_ok() {
        match *phase.borrow_and_update() {
            BootstrapPhase::Restoring => say("Restoring session..."),
            BootstrapPhase::Done => break,
            BootstrapPhase::Idle => {}
        }
    }
}

async fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

/// What to print once start-up restore has finished.
///
/// Only a successful restore is announced. Failing to restore is a normal
/// logged-out start, whatever the reason.
fn restore_notice(outcome: &BootstrapOutcome, username: Option<&str>) -> Option<String> {
    match outcome {
        BootstrapOutcome::Restored => username.map(|name| format!("Welcome back, {name}")),
        BootstrapOutcome::NotRestored(e) if e.is_transient() => {
            debug!(error = %e, "Session restore failed, continuing logged out");
            None
        }
        other => {
            debug!(?other, "Bootstrap finished");
            None
        }
    }
}

/// Run the shell until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading the terminal fails.
pub async fn run(storefront: &Storefront) -> Result<(), CliError> {
    let progress = tokio::spawn(show_restore_progress(storefront.bootstrap().subscribe()));
    let outcome = storefront.bootstrap().run().await;
    progress.abort();
    let username = storefront.session().get().map(|s| s.identity.username.clone());
    if let Some(notice) = restore_notice(&outcome, username.as_deref()) {
        say(notice);
    }
    say("Type 'help' for commands");

    let mut shell = Shell {
        storefront,
        return_to: None,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("emporium> ").await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(usage) => {
                say(usage);
                continue;
            }
        };

        let was_logged_in = storefront.session().state().is_authenticated();
        let is_logout = command == Command::Logout;
        if let Err(e) = shell.execute(command).await {
            say(e.user_message());
        }
        if was_logged_in && !is_logout && !storefront.session().state().is_authenticated() {
            say("Your session has ended, please log in again");
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_successful_restore_is_announced() {
        assert_eq!(
            restore_notice(&BootstrapOutcome::Restored, Some("asha")).as_deref(),
            Some("Welcome back, asha")
        );
        assert_eq!(restore_notice(&BootstrapOutcome::NoPriorSession, None), None);
        assert_eq!(
            restore_notice(&BootstrapOutcome::NotRestored(ApiError::Unauthenticated), None),
            None
        );
        let outage = ApiError::ServerFault {
            status: 502,
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(restore_notice(&BootstrapOutcome::NotRestored(outage), None), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("help").unwrap(), Command::Help);
        assert_eq!(
            parse("login asha s3cret").unwrap(),
            Command::Login {
                user: "asha".to_string(),
                password: "s3cret".to_string()
            }
        );
        assert_eq!(
            parse("products linen shirt").unwrap(),
            Command::Products {
                search: Some("linen shirt".to_string())
            }
        );
        assert_eq!(parse("products").unwrap(), Command::Products { search: None });
        assert_eq!(
            parse("review p1 4 Fits well, nice fabric").unwrap(),
            Command::Review {
                id: "p1".to_string(),
                rating: 4,
                comment: "Fits well, nice fabric".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("login asha").unwrap_err().starts_with("usage: login"));
        assert!(parse("cart-add").unwrap_err().starts_with("usage: cart-add"));
        assert!(parse("review p1 five great").is_err());
        assert!(parse("dance").unwrap_err().contains("unknown command"));
    }

    #[test]
    fn test_address_input() {
        let fields: Vec<String> = "Asha|9876543210|560001|Indiranagar|1 CMH Road|Bengaluru|Karnataka|work|"
            .split('|')
            .map(str::to_string)
            .collect();
        let input = address_input(&fields).unwrap();
        assert_eq!(input.address_type, AddressType::Work);
        assert!(input.alternate_phone.is_none());

        assert!(address_input(&fields[..5]).is_err());
        let mut bad = fields;
        bad[7] = "office".to_string();
        assert!(address_input(&bad).unwrap_err().contains("home or work"));
    }
}
