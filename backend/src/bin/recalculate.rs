//! Maintenance CLI for the cached stock and CMUP figures
//!
//! Re-derives `current_stock_quantity` and `cmup_cost` from the transaction
//! ledger, for one product or for the whole catalog. The normal request path
//! keeps these fields current; this tool exists for repair after manual
//! database surgery or for verifying the cache against the ledger.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use dms_backend::config::Config;
use dms_backend::services::{CmupCalculator, StockCalculator};

#[derive(Parser)]
#[command(name = "dms-recalculate")]
#[command(about = "Recalculate cached stock quantities and CMUP values from the ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recalculate stock for all products or a specific product
    Stock {
        /// Recalculate only this product
        #[arg(long)]
        product_id: Option<Uuid>,

        /// Also recalculate CMUP after recalculating stock
        #[arg(long)]
        with_cmup: bool,
    },

    /// Recalculate CMUP for all products or a specific product
    Cmup {
        /// Recalculate only this product
        #[arg(long)]
        product_id: Option<Uuid>,

        /// Also recalculate stock before recalculating CMUP
        #[arg(long)]
        with_stock: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dms_backend=info,sqlx=warn".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::load().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;
    let mut conn = pool.acquire().await?;

    match cli.command {
        Commands::Stock {
            product_id,
            with_cmup,
        } => match product_id {
            Some(product_id) => {
                let (name, old_stock, _) = load_product(&mut conn, product_id).await?;
                println!("Recalculating stock for product: {name} ({product_id})");
                println!("Old stock: {old_stock}");

                let stock = StockCalculator::update_stock(&mut conn, product_id).await?;
                println!("New stock: {stock}");

                if with_cmup {
                    let cmup = CmupCalculator::update_cmup(&mut conn, product_id).await?;
                    println!("CMUP updated: {cmup}");
                }
            }
            None => {
                println!("Recalculating stock for all products...");
                let count = StockCalculator::recalculate_all_stock(&mut conn).await?;
                println!("Stock recalculation completed for {count} products.");

                if with_cmup {
                    println!("Recalculating CMUP for all products...");
                    let count = CmupCalculator::recalculate_all_cmup(&mut conn).await?;
                    println!("CMUP recalculation completed for {count} products.");
                }
            }
        },
        Commands::Cmup {
            product_id,
            with_stock,
        } => match product_id {
            Some(product_id) => {
                let (name, _, old_cmup) = load_product(&mut conn, product_id).await?;

                if with_stock {
                    let stock = StockCalculator::update_stock(&mut conn, product_id).await?;
                    println!("Stock updated: {stock}");
                }

                println!("Recalculating CMUP for product: {name} ({product_id})");
                println!("Old CMUP: {old_cmup}");

                let cmup = CmupCalculator::update_cmup(&mut conn, product_id).await?;
                println!("New CMUP: {cmup}");
            }
            None => {
                if with_stock {
                    println!("Recalculating stock for all products first...");
                    StockCalculator::recalculate_all_stock(&mut conn).await?;
                    println!("Stock recalculation completed.");
                }

                println!("Recalculating CMUP for all products...");
                let count = CmupCalculator::recalculate_all_cmup(&mut conn).await?;
                println!("CMUP recalculation completed for {count} products.");
            }
        },
    }

    Ok(())
}

/// Load a product's name and cached figures, failing when it does not exist
async fn load_product(
    conn: &mut sqlx::PgConnection,
    product_id: Uuid,
) -> anyhow::Result<(String, Decimal, Decimal)> {
    let product = sqlx::query_as::<_, (String, Decimal, Decimal)>(
        r#"
        SELECT name, current_stock_quantity, cmup_cost
        FROM products
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    match product {
        Some(product) => Ok(product),
        None => bail!("Product with ID {product_id} not found"),
    }
}
