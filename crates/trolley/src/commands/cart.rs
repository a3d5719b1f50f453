//! Cart command - edits the persisted cart.

use anyhow::Result;
use clap::{Args, Subcommand};
use trolley_expiry::{Product, Variant};

use super::{Context, print_view};

/// Arguments for the cart command.
#[derive(Args, Debug)]
pub struct CartArgs {
    #[command(subcommand)]
    pub command: CartCommand,
}

#[derive(Subcommand, Debug)]
pub enum CartCommand {
    /// Add units of a product size, bounded by the stock on hand
    Add(AddArgs),

    /// Add one unit to an existing line
    Inc(LineArgs),

    /// Remove one unit from a line (never below one)
    Dec(LineArgs),

    /// Remove a line
    Remove(LineArgs),

    /// Empty the cart
    Clear,

    /// Show the cart
    Show,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Product id
    #[arg(long)]
    pub product_id: u64,

    /// Size id of the variant
    #[arg(long)]
    pub size_id: u64,

    /// Product display name
    #[arg(long)]
    pub name: String,

    /// Size label
    #[arg(long, default_value = "One size")]
    pub size: String,

    /// Unit price
    #[arg(long)]
    pub price: f64,

    /// Units to add
    #[arg(short, long, default_value_t = 1)]
    pub quantity: u32,

    /// Units available for this size
    #[arg(long)]
    pub stock: u32,

    /// Product image
    #[arg(long)]
    pub image_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct LineArgs {
    /// Product id
    pub product_id: u64,

    /// Size id
    pub size_id: u64,
}

/// Run the cart command.
pub async fn run(args: CartArgs, ctx: &Context) -> Result<()> {
    let mut coordinator = ctx.coordinator()?;

    match args.command {
        CartCommand::Add(add) => {
            let product = Product {
                product_id: add.product_id,
                product_name: add.name,
                image_url_primary: add.image_url,
                variants: vec![Variant {
                    size_id: add.size_id,
                    size: add.size,
                    price: add.price,
                }],
            };
            coordinator.add(&product, add.size_id, add.quantity, add.stock)?;
        }
        CartCommand::Inc(line) => {
            if !coordinator.increment(line.product_id, line.size_id)? {
                anyhow::bail!(
                    "no cart line for product {} size {}",
                    line.product_id,
                    line.size_id
                );
            }
        }
        CartCommand::Dec(line) => {
            coordinator.decrement(line.product_id, line.size_id);
        }
        CartCommand::Remove(line) => {
            if !coordinator.remove(line.product_id, line.size_id) {
                anyhow::bail!(
                    "no cart line for product {} size {}",
                    line.product_id,
                    line.size_id
                );
            }
        }
        CartCommand::Clear => coordinator.clear(),
        CartCommand::Show => {}
    }

    print_view(&coordinator.view(), ctx)
}
