//! Luigi's ordering CLI

use std::{
    io::{self, Write},
    process::ExitCode,
    str::FromStr,
};

use clap::{Args, Parser, Subcommand};
use jiff::{Timestamp, civil::Weekday};
use luigis::{
    address::{AddressError, AddressForm, Coordinates, DetectedAddress},
    cart::{Cart, CartError},
    checkout::CheckoutError,
    config::Config,
    display::{DisplayError, write_cart, write_menu},
    manager::{AddOutcome, CartManager},
    menu::{Catalog, CatalogError, MenuItem, VariantChoice},
    observability::{self, ObservabilityError},
    pricing::format_price,
    promos::{Promo, PromoClient, PromoError},
    selection::Choice,
    session::{PageParams, SessionClient, SessionError},
    transport::{HttpTransport, TransportError},
};
use reqwest::Url;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "luigis", about = "Luigi's ordering CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the menu
    Menu,

    /// Look up the session a page was opened with
    Session(PageArgs),

    /// Show today's promotions
    Promo,

    /// Build a cart and send the order
    Checkout(CheckoutArgs),

    /// Send a delivery address
    Address(AddressArgs),
}

/// Identifiers normally carried in the page URL.
#[derive(Debug, Args)]
struct PageArgs {
    /// Full page URL; its query parameters are used as defaults
    #[arg(long)]
    page_url: Option<Url>,

    /// Session token
    #[arg(long)]
    token: Option<String>,

    /// Order identifier
    #[arg(long)]
    order_id: Option<String>,

    /// Workflow resume URL
    #[arg(long)]
    resume_url: Option<Url>,
}

impl PageArgs {
    fn params(&self) -> PageParams {
        let mut params = self
            .page_url
            .as_ref()
            .map(PageParams::from_url)
            .unwrap_or_default();

        if let Some(token) = &self.token {
            params.token = Some(token.clone());
        }

        if let Some(order_id) = &self.order_id {
            params.order_id = Some(order_id.clone());
        }

        if let Some(resume_url) = &self.resume_url {
            params.resume_url = Some(resume_url.clone());
        }

        params
    }
}

#[derive(Debug, Args)]
struct CheckoutArgs {
    #[command(flatten)]
    page: PageArgs,

    /// Item to order as NAME[:VARIANT][xQTY], e.g. "LUIGII DE CARNE:Con papas x2"
    #[arg(long = "item", value_name = "ITEM")]
    items: Vec<ItemSpec>,

    /// Add a promotion by name, if it runs today
    #[arg(long)]
    promo: Option<String>,

    /// Print the order payload instead of sending it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct AddressArgs {
    #[command(flatten)]
    page: PageArgs,

    /// Free-text address
    #[arg(long)]
    address: String,

    /// Pin latitude
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Pin longitude
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,

    /// Province
    #[arg(long, default_value = "")]
    province: String,

    /// District
    #[arg(long, default_value = "")]
    district: String,

    /// Street
    #[arg(long, default_value = "")]
    street: String,

    /// Zone or neighbourhood
    #[arg(long, default_value = "")]
    zone: String,

    /// House number
    #[arg(long, default_value = "")]
    number: String,

    /// References for the rider
    #[arg(long, default_value = "")]
    info: String,

    /// Postal code
    #[arg(long, default_value = "")]
    postal_code: String,
}

/// `NAME[:VARIANT][xQTY]`
#[derive(Clone, Debug, PartialEq, Eq)]
struct ItemSpec {
    name: String,
    variant: Option<String>,
    quantity: u32,
}

impl FromStr for ItemSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, quantity) = match s.trim().rsplit_once('x') {
            Some((rest, digits))
                if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) =>
            {
                let quantity = digits
                    .parse::<u32>()
                    .map_err(|error| format!("invalid quantity in {s:?}: {error}"))?;

                (rest.trim(), quantity)
            }
            _ => (s.trim(), 1),
        };

        if quantity == 0 {
            return Err(format!("quantity must be at least 1 in {s:?}"));
        }

        let (name, variant) = match rest.split_once(':') {
            Some((name, variant)) => (name.trim(), Some(variant.trim().to_string())),
            None => (rest, None),
        };

        if name.is_empty() {
            return Err(format!("missing item name in {s:?}"));
        }

        Ok(Self {
            name: name.to_string(),
            variant,
            quantity,
        })
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Observability(#[from] ObservabilityError),

    #[error("failed to load menu: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no menu item named {0:?}")]
    UnknownItem(String),

    #[error("{item} needs one of: {options}")]
    ChoiceRequired { item: String, options: String },

    #[error("{item} has no option {variant:?}")]
    UnknownVariant { item: String, variant: String },

    #[error("no promotion named {0:?}")]
    UnknownPromo(String),

    #[error("a session token is required")]
    MissingToken,
}

#[tokio::main]
#[expect(
    clippy::print_stderr,
    reason = "the CLI reports fatal errors on stderr"
)]
async fn main() -> ExitCode {
    let cli = match Cli::load() {
        Ok(cli) => cli,
        Err(error) => {
            _ = error.print();

            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(2));
        }
    };

    if let Err(error) = run(cli).await {
        eprintln!("{error}");

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), CliError> {
    observability::init(&cli.config.logging)?;

    let Cli { config, command } = cli;

    match command {
        Commands::Menu => write_menu(io::stdout().lock(), &load_catalog(&config)?)?,
        Commands::Session(page) => show_session(&config, &page).await?,
        Commands::Promo => show_promos(&config).await?,
        Commands::Checkout(args) => checkout(&config, &args).await?,
        Commands::Address(args) => send_address(&config, &args).await?,
    }

    Ok(())
}

fn load_catalog(config: &Config) -> Result<Catalog, CatalogError> {
    match &config.catalog.catalog_path {
        Some(path) => Catalog::from_path(path),
        None => Catalog::luigis(),
    }
}

async fn show_session(config: &Config, page: &PageArgs) -> Result<(), CliError> {
    let params = page.params();
    let transport = HttpTransport::new(config.endpoints.timeout())?;
    let client = SessionClient::new(transport, config.endpoints.api_url.clone());

    let result = match params.require_token() {
        Ok(token) => client.fetch(token).await,
        Err(error) => Err(error),
    };

    let mut out = io::stdout().lock();

    match result {
        Ok(session) => {
            writeln!(out, "{}", serde_json::to_string_pretty(&session)?)?;

            Ok(())
        }
        Err(error) => {
            if let Ok(redirect) = error.redirect_url(&config.endpoints.frontend_url) {
                writeln!(out, "redirect: {redirect}")?;
            }

            Err(error.into())
        }
    }
}

async fn show_promos(config: &Config) -> Result<(), CliError> {
    let today = promo_day(config).await?;
    let mut out = io::stdout().lock();

    for promo in Promo::all() {
        let status = if today.is_some_and(|day| promo.is_available_on(day)) {
            "disponible hoy".to_string()
        } else {
            promo.unavailable_message()
        };

        writeln!(
            out,
            "{} ({}) {}: {}",
            promo.name(),
            format_price(&promo.price()),
            promo.day_label(),
            status
        )?;
    }

    Ok(())
}

async fn promo_day(config: &Config) -> Result<Option<Weekday>, CliError> {
    let transport = HttpTransport::new(config.endpoints.timeout())?;
    let client = PromoClient::new(transport, config.endpoints.frontend_url.clone());

    Ok(client.today().await)
}

async fn checkout(config: &Config, args: &CheckoutArgs) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let mut manager = CartManager::new(
        Cart::new(catalog.currency()),
        config.endpoints.checkout_endpoints(),
    );

    for spec in &args.items {
        let item = catalog
            .find(&spec.name)
            .ok_or_else(|| CliError::UnknownItem(spec.name.clone()))?;

        for _ in 0..spec.quantity {
            add_item(&mut manager, item, spec.variant.as_deref())?;
        }
    }

    if let Some(name) = &args.promo {
        let promo = Promo::all()
            .iter()
            .find(|promo| promo.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CliError::UnknownPromo(name.clone()))?;

        let item = promo.select(promo_day(config).await?)?;

        add_item(&mut manager, &item, None)?;
    }

    manager.open_review();

    let mut out = io::stdout().lock();

    write_cart(&mut out, manager.cart())?;

    let context = args.page.params().checkout_context();

    if args.dry_run {
        let request = manager.begin_checkout(&context)?;

        writeln!(out, "POST {}", request.target.url())?;
        writeln!(out, "{}", serde_json::to_string_pretty(&request.payload)?)?;

        return Ok(());
    }

    let transport = HttpTransport::new(config.endpoints.timeout())?;
    let result = manager.checkout(&transport, &context).await;

    if let Some(toast) = manager.active_toast(Timestamp::now()) {
        writeln!(out, "{}", toast.message())?;
    }

    let receipt = result?;

    if let Some(path) = receipt.confirmation_path() {
        writeln!(
            out,
            "{}{path}",
            config.endpoints.frontend_url.as_str().trim_end_matches('/')
        )?;
    }

    info!(order_id = ?receipt.order_id, "checkout complete");

    Ok(())
}

fn add_item(
    manager: &mut CartManager,
    item: &MenuItem,
    variant: Option<&str>,
) -> Result<(), CliError> {
    if manager.add_item(item)? == AddOutcome::AwaitingChoice {
        let Some(label) = variant else {
            manager.cancel_selection();

            return Err(CliError::ChoiceRequired {
                item: item.name().to_string(),
                options: option_list(item),
            });
        };

        let choice = match item.choice() {
            VariantChoice::AddOn => item.variant(label).map(|v| Choice::AddOn(v.is_add_on())),
            VariantChoice::Flavor => Some(Choice::Flavor(label.to_string())),
            VariantChoice::None => None,
        };

        let added = match choice {
            Some(choice) => manager.choose(&choice)?,
            None => {
                manager.cancel_selection();

                None
            }
        };

        if added.is_none() {
            return Err(CliError::UnknownVariant {
                item: item.name().to_string(),
                variant: label.to_string(),
            });
        }
    }

    Ok(())
}

fn option_list(item: &MenuItem) -> String {
    item.variants()
        .iter()
        .map(|variant| variant.label())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn send_address(config: &Config, args: &AddressArgs) -> Result<(), CliError> {
    let page = args.page.params();

    if page.resume_url.is_none() && config.endpoints.address_webhook_url.is_none() {
        page.require_token().map_err(|_err| CliError::MissingToken)?;
    }

    let coordinates = args
        .lat
        .zip(args.lng)
        .map(|(lat, lng)| Coordinates { lat, lng });

    let detected = DetectedAddress {
        province: args.province.clone(),
        district: args.district.clone(),
        street: args.street.clone(),
        zone: args.zone.clone(),
        number: args.number.clone(),
    };

    let mut form = AddressForm::new();

    form.select_address(args.address.clone(), &detected, coordinates);
    form.details_mut().additional_info.clone_from(&args.info);
    form.details_mut().postal_code.clone_from(&args.postal_code);

    let transport = HttpTransport::new(config.endpoints.timeout())?;
    let result = form
        .submit(&transport, &page, &config.endpoints.address_endpoints())
        .await;

    if let Some(notice) = form.notice() {
        writeln!(io::stdout().lock(), "{}", notice.message())?;
    }

    Ok(result?)
}
