use std::sync::Arc;

use chrono::NaiveDate;
use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use groupbid_core::api::{
    PortfolioScope, PostMessageRequest, StartNegotiationRequest, SubmitOfferRequest,
};
use groupbid_core::domain::collective::CollectiveId;
use groupbid_core::domain::negotiation::{NegotiationId, RoundActor, SenderKind};
use groupbid_core::domain::supplier::SupplierId;
use groupbid_db::repositories::{
    SqlCollectiveDirectory, SqlNegotiationRepository, SqlSupplierDirectory,
};
use groupbid_db::{DbPool, NegotiationService};

use crate::commands::{to_data, with_session, CommandResult, Failure, Success};

#[derive(Debug, Subcommand)]
pub enum NegotiateCommand {
    #[command(about = "Open a negotiation between a collective and a supplier")]
    Start(StartArgs),
    #[command(about = "Record an offer or counter-offer as the next round")]
    Offer(OfferArgs),
    #[command(about = "Agree on the terms of the latest round")]
    Accept(NegotiationArg),
    #[command(about = "Cancel a live negotiation")]
    Cancel(NegotiationArg),
    #[command(about = "Close a live negotiation without agreement")]
    Close(NegotiationArg),
    #[command(about = "Show a negotiation with its rounds and messages")]
    Show(NegotiationArg),
    #[command(about = "Post a message to a negotiation thread")]
    Message(MessageArgs),
    #[command(about = "List open and closed negotiations for a collective or a supplier")]
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct StartArgs {
    #[arg(long)]
    pub collective: i64,
    #[arg(long)]
    pub supplier: i64,
    #[arg(long, help = "Target price per member per month")]
    pub target_pmpm: Option<Decimal>,
    #[arg(long)]
    pub population: Option<u32>,
    #[arg(long, help = "low, medium or high; anything else reads as medium")]
    pub risk_appetite: Option<String>,
    #[arg(long, help = "Coverage start date, YYYY-MM-DD")]
    pub start_date: Option<NaiveDate>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ActorArg {
    Supplier,
    Collective,
}

impl From<ActorArg> for RoundActor {
    fn from(value: ActorArg) -> Self {
        match value {
            ActorArg::Supplier => Self::Supplier,
            ActorArg::Collective => Self::Collective,
        }
    }
}

#[derive(Debug, Args)]
pub struct OfferArgs {
    #[arg(long)]
    pub negotiation: i64,
    #[arg(long, value_enum)]
    pub actor: ActorArg,
    #[arg(long, help = "Proposed price per member per month")]
    pub pmpm: Decimal,
    #[arg(long, help = "Expected loss ratio, as a fraction (0.82) or a percentage (82)")]
    pub mlr: Option<Decimal>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, help = "Close the deal if the offer is judged acceptable")]
    pub accept: bool,
}

#[derive(Debug, Args)]
pub struct NegotiationArg {
    #[arg(long)]
    pub negotiation: i64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SenderArg {
    Collective,
    Supplier,
    System,
}

impl From<SenderArg> for SenderKind {
    fn from(value: SenderArg) -> Self {
        match value {
            SenderArg::Collective => Self::Collective,
            SenderArg::Supplier => Self::Supplier,
            SenderArg::System => Self::System,
        }
    }
}

#[derive(Debug, Args)]
pub struct MessageArgs {
    #[arg(long)]
    pub negotiation: i64,
    #[arg(long, value_enum)]
    pub sender: SenderArg,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub body: String,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("scope").required(true).args(["collective", "supplier"])))]
pub struct ListArgs {
    #[arg(long)]
    pub collective: Option<i64>,
    #[arg(long)]
    pub supplier: Option<i64>,
}

impl ListArgs {
    fn scope(&self) -> Result<PortfolioScope, Failure> {
        match (self.collective, self.supplier) {
            (Some(id), None) => Ok(PortfolioScope::Collective(CollectiveId(id))),
            (None, Some(id)) => Ok(PortfolioScope::Supplier(SupplierId(id))),
            _ => Err(Failure::new(
                "invalid_input",
                "pass exactly one of --collective or --supplier",
                6,
            )),
        }
    }
}

fn service(pool: &DbPool) -> NegotiationService {
    NegotiationService::new(
        Arc::new(SqlNegotiationRepository::new(pool.clone())),
        Arc::new(SqlCollectiveDirectory::new(pool.clone())),
        Arc::new(SqlSupplierDirectory::new(pool.clone())),
    )
}

pub fn run(command: NegotiateCommand) -> CommandResult {
    match command {
        NegotiateCommand::Start(args) => start(args),
        NegotiateCommand::Offer(args) => offer(args),
        NegotiateCommand::Accept(args) => accept(args),
        NegotiateCommand::Cancel(args) => cancel(args),
        NegotiateCommand::Close(args) => close(args),
        NegotiateCommand::Show(args) => show(args),
        NegotiateCommand::Message(args) => message(args),
        NegotiateCommand::List(args) => list(args),
    }
}

pub fn start(args: StartArgs) -> CommandResult {
    with_session("negotiate.start", |session| async move {
        let request = StartNegotiationRequest {
            collective_id: CollectiveId(args.collective),
            supplier_id: SupplierId(args.supplier),
            target_pmpm: args.target_pmpm,
            target_population_size: args.population,
            risk_appetite: args.risk_appetite,
            target_start_date: args.start_date,
            notes: args.notes,
        };
        let negotiation = service(&session.pool)
            .start(request, &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        Ok(Success::new(format!("negotiation {} opened", negotiation.id), to_data(&negotiation)?))
    })
}

pub fn offer(args: OfferArgs) -> CommandResult {
    with_session("negotiate.offer", |session| async move {
        let request = SubmitOfferRequest {
            negotiation_id: NegotiationId(args.negotiation),
            actor: args.actor.into(),
            proposed_pmpm: args.pmpm,
            proposed_mlr: args.mlr,
            notes: args.notes,
            accept: args.accept,
        };
        let response = service(&session.pool)
            .submit_offer(request, &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!(
            "round {} recorded on negotiation {}: {} (status {})",
            response.round.round_number,
            response.negotiation_id,
            response.evaluation.recommended_action.as_str(),
            response.status.as_str()
        );
        Ok(Success::new(message, to_data(&response)?))
    })
}

pub fn accept(args: NegotiationArg) -> CommandResult {
    with_session("negotiate.accept", |session| async move {
        let response = service(&session.pool)
            .accept_latest(NegotiationId(args.negotiation), &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!(
            "negotiation {} agreed at {} per member per month",
            response.negotiation_id, response.final_agreed_pmpm
        );
        Ok(Success::new(message, to_data(&response)?))
    })
}

pub fn cancel(args: NegotiationArg) -> CommandResult {
    with_session("negotiate.cancel", |session| async move {
        let negotiation = service(&session.pool)
            .cancel(NegotiationId(args.negotiation), &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        Ok(Success::new(
            format!("negotiation {} cancelled", negotiation.id),
            to_data(&negotiation)?,
        ))
    })
}

pub fn close(args: NegotiationArg) -> CommandResult {
    with_session("negotiate.close", |session| async move {
        let negotiation = service(&session.pool)
            .close(NegotiationId(args.negotiation), &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        Ok(Success::new(format!("negotiation {} closed", negotiation.id), to_data(&negotiation)?))
    })
}

pub fn show(args: NegotiationArg) -> CommandResult {
    with_session("negotiate.show", |session| async move {
        let negotiation = service(&session.pool)
            .get(NegotiationId(args.negotiation))
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!(
            "negotiation {} is {} after {} rounds",
            negotiation.id,
            negotiation.status.as_str(),
            negotiation.rounds.len()
        );
        Ok(Success::new(message, to_data(&negotiation)?))
    })
}

pub fn message(args: MessageArgs) -> CommandResult {
    with_session("negotiate.message", |session| async move {
        let request = PostMessageRequest {
            negotiation_id: NegotiationId(args.negotiation),
            sender_type: args.sender.into(),
            sender_name: args.name,
            body: args.body,
        };
        let posted = service(&session.pool)
            .post_message(request, &session.correlation_id)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        Ok(Success::new(
            format!("message {} posted to negotiation {}", posted.id.0, posted.negotiation_id),
            to_data(&posted)?,
        ))
    })
}

pub fn list(args: ListArgs) -> CommandResult {
    with_session("negotiate.list", |session| async move {
        let scope = args.scope()?;
        let portfolio = service(&session.pool)
            .list(scope)
            .await
            .map_err(|error| Failure::application(error, &session.correlation_id))?;
        let message = format!(
            "{} open and {} closed negotiations",
            portfolio.open.len(),
            portfolio.closed.len()
        );
        Ok(Success::new(message, to_data(&portfolio)?))
    })
}
