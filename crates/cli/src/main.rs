//! TipJar CLI - Main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tipjar_cli::{commands, AppContext};

#[derive(Parser)]
#[command(name = "tipjar")]
#[command(about = "TipJar - Ledger & Settlement Engine", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Credit a wallet from a payment session
    TopUp {
        /// User ID
        user: String,
        /// Amount in pence
        amount: i64,
        /// Upstream payment-session id (replay guard)
        session: String,
    },

    /// Withdraw from a wallet
    PayOut {
        /// User ID
        user: String,
        /// Amount in pence
        amount: i64,
        /// Payout reference (replay guard)
        reference: String,
    },

    /// Place a bid (tip) on a media item
    Bid {
        /// Tipping user ID
        user: String,
        /// Target media ID
        media: String,
        /// Amount in pence
        amount: i64,
        /// Party to scope the bid to (omit for a global bid)
        #[arg(long)]
        party: Option<String>,
        /// Target is a podcast episode rather than a song
        #[arg(long)]
        episode: bool,
    },

    /// Mark an active bid's media as played
    Played {
        /// Bid ID
        bid: String,
    },

    /// Veto an active bid (admin), refunding the tip
    Veto {
        /// Bid ID
        bid: String,
    },

    /// Apply an approved refund request to an active bid
    Refund {
        /// Bid ID
        bid: String,
    },

    /// Show a user's wallet
    Balance {
        /// User ID
        user: String,
    },

    /// Set or update a verified owner's stake on a media item
    SetOwner {
        /// Media ID
        media: String,
        /// Owner's user ID
        user: String,
        /// Ownership percentage (1-100)
        percentage: u8,
        /// Owner role
        #[arg(long, default_value = "ARTIST")]
        role: String,
        /// Acting user recorded in the audit trail
        #[arg(long, default_value = "admin")]
        acting_user: String,
    },

    /// List a media item's verified owners
    Owners {
        /// Media ID
        media: String,
    },

    /// Register an escrow share for an unregistered artist
    EscrowShare {
        /// Media ID
        media: String,
        /// Ownership percentage held in escrow (1-100)
        percentage: u8,
        /// Artist name for later matching
        artist: String,
        /// External identifiers as KIND=value (e.g. SPOTIFY_ARTIST_ID=sp-123)
        #[arg(long = "id")]
        identifiers: Vec<String>,
    },

    /// Find unclaimed escrow allocations matching an artist name
    EscrowFind {
        /// Artist name
        artist: String,
    },

    /// Claim an escrow allocation for a registered user
    EscrowClaim {
        /// Allocation ID
        allocation: String,
        /// Claiming user ID
        user: String,
    },

    /// Verify entry digests over a window of recent entries
    Audit {
        /// Number of recent entries to verify
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Print the most recent ledger entries
    Ledger {
        /// Maximum number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let ctx = AppContext::new(&cli.data)?;

    match cli.command {
        Commands::TopUp {
            user,
            amount,
            session,
        } => commands::top_up(&ctx, &user, amount, &session)?,

        Commands::PayOut {
            user,
            amount,
            reference,
        } => commands::pay_out(&ctx, &user, amount, &reference)?,

        Commands::Bid {
            user,
            media,
            amount,
            party,
            episode,
        } => commands::bid(&ctx, &user, &media, amount, party.as_deref(), episode)?,

        Commands::Played { bid } => commands::played(&ctx, &bid)?,
        Commands::Veto { bid } => commands::veto(&ctx, &bid)?,
        Commands::Refund { bid } => commands::refund(&ctx, &bid)?,
        Commands::Balance { user } => commands::balance(&ctx, &user)?,

        Commands::SetOwner {
            media,
            user,
            percentage,
            role,
            acting_user,
        } => commands::set_owner(&ctx, &media, &user, percentage, &role, &acting_user)?,

        Commands::Owners { media } => commands::owners(&ctx, &media)?,

        Commands::EscrowShare {
            media,
            percentage,
            artist,
            identifiers,
        } => commands::escrow_share(&ctx, &media, percentage, &artist, &identifiers)?,

        Commands::EscrowFind { artist } => commands::escrow_find(&ctx, &artist)?,

        Commands::EscrowClaim { allocation, user } => {
            commands::escrow_claim(&ctx, &allocation, &user)?
        }

        Commands::Audit { limit } => commands::audit(&ctx, limit)?,
        Commands::Ledger { limit } => commands::ledger(&ctx, limit)?,
    }

    Ok(())
}
