mod inputs;

use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AccumulationResult, PlanError, PlanResult, SalaryBreakdown, WithdrawalPlanResult,
    net_salary_breakdown, plan_withdrawal, simulate_accumulation,
};

pub use inputs::{
    AccumulatePayload, CliEtfType, CliPhaseScope, NetSalaryArgs, SalaryArgs, SalaryPayload,
    ScenarioArgs, WithdrawalArgs, WithdrawalPayload, build_salary_profile, build_scenario,
    build_withdrawal, parse_phase,
};

const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Debug)]
#[command(
    name = "sparplan",
    about = "ETF savings plan and withdrawal planner with German salary and fund taxation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the JSON HTTP API
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Simulate the accumulation phase
    Accumulate(ScenarioArgs),
    /// Solve the inflation-indexed withdrawal plan that depletes the capital
    Withdraw(WithdrawalArgs),
    /// Break a gross salary down into taxes, social insurance and net pay
    NetSalary(NetSalaryArgs),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn accumulate(args: &ScenarioArgs) -> PlanResult<AccumulationResult> {
    let (inputs, plan) = build_scenario(args)?;
    Ok(simulate_accumulation(&inputs, &plan))
}

pub fn withdraw(args: &WithdrawalArgs) -> PlanResult<WithdrawalPlanResult> {
    let params = build_withdrawal(args)?;
    plan_withdrawal(&params)
}

pub fn net_salary(args: &NetSalaryArgs) -> PlanResult<SalaryBreakdown> {
    if !args.gross.is_finite() || args.gross < 0.0 {
        return Err(PlanError::invalid_input("gross", "must be >= 0"));
    }
    let profile = build_salary_profile(&args.salary)?;
    Ok(net_salary_breakdown(args.gross, &profile))
}

/// Runs one CLI command to completion and returns the pretty-printed JSON
/// result. `serve` blocks until the server stops and yields an empty string.
pub async fn run_command(command: Command) -> Result<String, ApiError> {
    let json = match command {
        Command::Serve { port } => {
            run_http_server(port).await?;
            return Ok(String::new());
        }
        Command::Accumulate(args) => serde_json::to_string_pretty(&accumulate(&args)?)?,
        Command::Withdraw(args) => serde_json::to_string_pretty(&withdraw(&args)?)?,
        Command::NetSalary(args) => serde_json::to_string_pretty(&net_salary(&args)?)?,
    };
    Ok(json)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "sparplan HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/accumulate");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/accumulate",
            get(accumulate_get_handler).post(accumulate_post_handler),
        )
        .route(
            "/api/withdrawal",
            get(withdrawal_get_handler).post(withdrawal_post_handler),
        )
        .route(
            "/api/net-salary",
            get(net_salary_get_handler).post(net_salary_post_handler),
        )
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn accumulate_get_handler(Query(payload): Query<AccumulatePayload>) -> Response {
    accumulate_response(payload)
}

async fn accumulate_post_handler(Json(payload): Json<AccumulatePayload>) -> Response {
    accumulate_response(payload)
}

async fn withdrawal_get_handler(Query(payload): Query<WithdrawalPayload>) -> Response {
    withdrawal_response(payload)
}

async fn withdrawal_post_handler(Json(payload): Json<WithdrawalPayload>) -> Response {
    withdrawal_response(payload)
}

async fn net_salary_get_handler(Query(payload): Query<SalaryPayload>) -> Response {
    net_salary_response(payload)
}

async fn net_salary_post_handler(Json(payload): Json<SalaryPayload>) -> Response {
    net_salary_response(payload)
}

fn accumulate_response(payload: AccumulatePayload) -> Response {
    let result = accumulate(&payload.into_args());
    if let Ok(result) = &result {
        info!(
            years = result.yearly_data.len().saturating_sub(1),
            final_nominal = result.final_nominal,
            "accumulation simulated"
        );
    }
    plan_response("/api/accumulate", result)
}

fn withdrawal_response(payload: WithdrawalPayload) -> Response {
    let result = withdraw(&payload.into_args());
    if let Ok(plan) = &result {
        info!(
            base_annual_withdrawal = plan.base_annual_withdrawal,
            method = ?plan.solver.method,
            converged = plan.solver.converged,
            "withdrawal plan solved"
        );
    }
    plan_response("/api/withdrawal", result)
}

fn net_salary_response(payload: SalaryPayload) -> Response {
    let result = net_salary(&payload.into_args());
    if let Ok(breakdown) = &result {
        info!(gross = breakdown.gross, net = breakdown.net, "net salary computed");
    }
    plan_response("/api/net-salary", result)
}

fn plan_response<T: Serialize>(endpoint: &str, result: PlanResult<T>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            warn!(endpoint, error = %err, "request rejected");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
