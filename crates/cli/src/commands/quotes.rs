use std::sync::Arc;

use clap::{Args, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use groupbid_core::api::SubmitSupplierBidRequest;
use groupbid_core::domain::collective::CollectiveId;
use groupbid_core::domain::supplier::{BidKind, SupplierId};
use groupbid_core::quoting::QuoteEngine;
use groupbid_db::repositories::{SqlBidRepository, SqlCollectiveDirectory, SqlSupplierDirectory};
use groupbid_db::QuoteSimulationService;

use crate::commands::{to_data, with_session, CommandResult, Failure, Session, Success};

#[derive(Debug, Subcommand)]
pub enum QuotesCommand {
    #[command(about = "Price every insurer for a collective and record the bids")]
    Simulate(CollectiveArg),
    #[command(about = "Rank the recorded bids for a collective, cheapest first")]
    Compare(CollectiveArg),
    #[command(about = "Record a bid placed directly by a supplier")]
    Bid(BidArgs),
    #[command(about = "List a supplier's bids, newest first")]
    List(SupplierArg),
}

#[derive(Debug, Args)]
pub struct CollectiveArg {
    #[arg(long)]
    pub collective: i64,
}

#[derive(Debug, Args)]
pub struct SupplierArg {
    #[arg(long)]
    pub supplier: i64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BidKindArg {
    InsurancePremium,
    RxDiscount,
    TelehealthBundle,
}

impl From<BidKindArg> for BidKind {
    fn from(value: BidKindArg) -> Self {
        match value {
            BidKindArg::InsurancePremium => Self::InsurancePremium,
            BidKindArg::RxDiscount => Self::RxDiscount,
            BidKindArg::TelehealthBundle => Self::TelehealthBundle,
        }
    }
}

#[derive(Debug, Args)]
pub struct BidArgs {
    #[arg(long)]
    pub supplier: i64,
    #[arg(long)]
    pub collective: i64,
    #[arg(long, value_enum, help = "Defaults to insurance-premium")]
    pub kind: Option<BidKindArg>,
    #[arg(long, help = "Monthly premium per member")]
    pub premium: Decimal,
    #[arg(long, help = "Discount percentage, 0 to 100")]
    pub discount: Option<Decimal>,
    #[arg(long)]
    pub notes: Option<String>,
}

fn service(session: &Session) -> QuoteSimulationService {
    QuoteSimulationService::new(
        Arc::new(SqlCollectiveDirectory::new(session.pool.clone())),
        Arc::new(SqlSupplierDirectory::new(session.pool.clone())),
        Arc::new(SqlBidRepository::new(session.pool.clone())),
        QuoteEngine::new(session.config.quoting.clone()),
    )
}

pub fn run(command: QuotesCommand) -> CommandResult {
    match command {
        QuotesCommand::Simulate(args) => simulate(args),
        QuotesCommand::Compare(args) => compare(args),
        QuotesCommand::Bid(args) => bid(args),
        QuotesCommand::List(args) => list(args),
    }
}

pub fn simulate(args: CollectiveArg) -> CommandResult {
    with_session("quotes.simulate", |session| async move {
        let quotes = service(&session)
            .simulate(CollectiveId(args.collective), &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!(
            "{} quotes for {} ({} members, risk multiplier {})",
            quotes.quotes.len(),
            quotes.collective_name,
            quotes.profile.member_count,
            quotes.profile.risk_multiplier
        );
        Ok(Success::new(message, to_data(&quotes)?))
    })
}

pub fn compare(args: CollectiveArg) -> CommandResult {
    with_session("quotes.compare", |session| async move {
        let comparison = service(&session)
            .compare(CollectiveId(args.collective))
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = match comparison.cheapest() {
            Some(best) => format!(
                "{} bids ranked; cheapest is {} at {}",
                comparison.bids.len(),
                best.supplier_name,
                best.bid.monthly_premium
            ),
            None => format!("no bids recorded for collective {}", comparison.collective_id),
        };
        Ok(Success::new(message, to_data(&comparison)?))
    })
}

pub fn bid(args: BidArgs) -> CommandResult {
    with_session("quotes.bid", |session| async move {
        let request = SubmitSupplierBidRequest {
            supplier_id: SupplierId(args.supplier),
            collective_id: CollectiveId(args.collective),
            bid_type: args.kind.map(BidKind::from),
            monthly_premium: args.premium,
            discount_percent: args.discount,
            notes: args.notes,
        };
        let bid = service(&session)
            .submit_bid(request, &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!(
            "bid {} recorded: supplier {} offers collective {} {} at {}",
            bid.id.0,
            bid.supplier_id,
            bid.collective_id,
            bid.bid_type.as_str(),
            bid.monthly_premium
        );
        Ok(Success::new(message, to_data(&bid)?))
    })
}

pub fn list(args: SupplierArg) -> CommandResult {
    with_session("quotes.list", |session| async move {
        let listing = service(&session)
            .list_for_supplier(SupplierId(args.supplier))
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!("{} bids from {}", listing.bids.len(), listing.supplier_name);
        Ok(Success::new(message, to_data(&listing)?))
    })
}
