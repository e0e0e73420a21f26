use super::{parse_account, Context};
use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use coinflip_core::{AccountStore, Amount, CoinflipError};
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account name
        name: String,
        /// Initial deposit in satoshis
        #[arg(short, long, default_value_t = 0)]
        deposit: u64,
    },
    /// Credit an account
    Deposit {
        /// Account name
        name: String,
        /// Amount in satoshis
        amount: u64,
    },
    /// Show an account's balance
    Balance {
        /// Account name
        name: String,
    },
    /// List all accounts
    List,
}

pub async fn handle_account_command(cmd: AccountCommands, ctx: &Context) -> Result<()> {
    match cmd {
        AccountCommands::Create { name, deposit } => {
            let id = parse_account(&name)?;

            let balance = ctx.storage.transaction(|tx| {
                let accounts = AccountStore::new(tx);
                accounts.create_account(&id, Utc::now())?;
                if deposit > 0 {
                    accounts.deposit(&id, Amount::from_sat(deposit))
                } else {
                    Ok::<_, CoinflipError>(Amount::ZERO)
                }
            })?;

            println!("Account '{}' created.", id);
            println!("  Balance: {} sats", balance.to_sat());
        }

        AccountCommands::Deposit { name, amount } => {
            let id = parse_account(&name)?;
            let balance = ctx
                .storage
                .transaction(|tx| AccountStore::new(tx).deposit(&id, Amount::from_sat(amount)))?;

            println!("Deposited {} sats to '{}'.", amount, id);
            println!("  Balance: {} sats", balance.to_sat());
        }

        AccountCommands::Balance { name } => {
            let id = parse_account(&name)?;
            let conn = ctx.storage.get_connection();
            let balance = AccountStore::new(&conn).balance(&id)?;

            println!("Balance for '{}':", id);
            println!(
                "  {} sats ({:.8} BTC)",
                balance.to_sat(),
                balance.to_btc()
            );
        }

        AccountCommands::List => {
            let conn = ctx.storage.get_connection();
            let accounts = AccountStore::new(&conn);
            let list = accounts.list_accounts()?;

            if list.is_empty() {
                println!("No accounts found.");
                println!("Create one with: coinflip account create <name> --deposit <sats>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Balance (sats)", "Created"]);

            for info in list {
                table.add_row(vec![
                    info.id.to_string(),
                    info.balance.to_sat().to_string(),
                    info.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
            }

            println!("{}", table);
            println!("In escrow: {} sats", accounts.escrow()?.to_sat());
        }
    }

    Ok(())
}
