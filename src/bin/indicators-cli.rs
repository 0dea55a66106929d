use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use transit_indicators::auth::users::UserStore;
use transit_indicators::auth::AuthState;
use transit_indicators::config::AuthConfig;
use transit_indicators::routing::{urlpatterns, DataStores};

#[derive(Parser)]
#[command(name = "indicators-cli")]
#[command(about = "Command-line client for the transit indicators API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// API token sent as `Authorization: Token <key>`
    #[arg(short, long, env = "INDICATORS_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the route table without contacting a server
    Routes,
    /// Show the current indicator and service versions
    Version,
    /// Obtain an API token for a user
    Token {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// List a collection, e.g. `list sample-periods`
    List {
        prefix: String,
        /// Filters as key=value pairs
        #[arg(short, long)]
        filter: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let base = Url::parse(&cli.url)?;
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Token {}", token))?);
    }

    match cli.command {
        Commands::Routes => print_routes()?,
        Commands::Version => {
            let res = client
                .get(base.join("api/indicators_version/")?)
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Token { username, password } => {
            let res = client
                .post(base.join("api-token-auth/")?)
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::List { prefix, filter } => {
            let mut url = base.join(&format!("api/{}/", prefix.trim_matches('/')))?;
            {
                let mut query = url.query_pairs_mut();
                for pair in &filter {
                    let (key, value) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("filter '{}' is not key=value", pair))?;
                    query.append_pair(key, value);
                }
            }
            if filter.is_empty() {
                url.set_query(None);
            }
            let res = client.get(url).headers(headers).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn print_routes() -> Result<(), Box<dyn std::error::Error>> {
    let auth = AuthState::from_config(&AuthConfig::default(), Arc::new(UserStore::new()))?;
    let urls = urlpatterns(&DataStores::new(Arc::new(auth)))?;
    for route in urls.routes() {
        println!("{:<45} {}", route.pattern, route.name);
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Err(format!("API returned status {}", status).into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
