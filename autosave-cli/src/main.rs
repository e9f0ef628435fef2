use anyhow::{anyhow, bail, Context, Result};
use autosave_execution::{accounting_report, accumulated_yield_of, MockYieldSource, TokenGateway};
use autosave_storage::{Applied, Sandbox, Storage};
use autosave_types::emergency::RequestId;
use autosave_types::{AccountId, LedgerConfig, LedgerInstruction, PlanDuration};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about = "AutoSave CLI: operate a local savings ledger sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, default_value = "./autosave-data")]
    data_dir: PathBuf,
    /// Unix timestamp to run at. Defaults to wall clock, never before the ledger clock.
    #[arg(long)]
    at: Option<u64>,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new sandbox ledger
    Init {
        #[arg(long)]
        admin: String,
        #[arg(long, default_value = "pool")]
        pool: String,
        /// JSON file with ledger parameters; missing fields use defaults
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "mock-lending")]
        protocol: String,
        #[arg(long, default_value_t = 500)]
        apy_bps: u64,
        #[arg(long)]
        no_yield_source: bool,
    },
    /// Mint test funds to an account and approve the pool
    Fund {
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: u64,
    },
    /// Open a savings plan
    CreatePlan {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        daily_amount: u64,
        /// 30, 90, 180 or 365
        #[arg(long)]
        days: u64,
    },
    /// Run the due deduction for one plan
    Deduct {
        #[arg(long)]
        plan_id: u64,
        #[arg(long, default_value = "keeper")]
        caller: String,
    },
    /// Run due deductions for several plans
    Batch {
        #[arg(long, value_delimiter = ',')]
        plan_ids: Vec<u64>,
        #[arg(long, default_value = "keeper")]
        caller: String,
    },
    Withdraw {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        plan_id: u64,
        /// 0 withdraws everything available
        #[arg(long, default_value_t = 0)]
        amount: u64,
    },
    ClaimYield {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        plan_id: u64,
    },
    Harvest {
        #[arg(long)]
        caller: String,
    },
    /// Let the mock yield source earn interest
    Accrue {
        #[arg(long)]
        secs: u64,
    },
    /// Admin operations
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Emergency withdrawals (ledger must be paused)
    #[command(subcommand)]
    Emergency(EmergencyCommand),
    /// Show pool totals, or one plan
    Show {
        #[arg(long)]
        plan_id: Option<u64>,
    },
    /// Solvency check against the yield source
    Status,
    /// Events recorded for a committed instruction
    Events {
        #[arg(long)]
        sequence: u64,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    SetParam {
        #[arg(long)]
        admin: String,
        #[arg(long, value_enum)]
        name: Param,
        #[arg(long)]
        value: u64,
        /// Upper bound, only for deduction-limits
        #[arg(long)]
        max: Option<u64>,
    },
    SetKeeper {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        keeper: String,
        #[arg(long)]
        disable: bool,
    },
    ProposeAdmin {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        proposed: String,
    },
    AcceptAdmin {
        #[arg(long)]
        caller: String,
    },
    Pause {
        #[arg(long)]
        admin: String,
    },
    Unpause {
        #[arg(long)]
        admin: String,
    },
    WithdrawFees {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 0)]
        amount: u64,
    },
    /// Exit the current yield source into a fresh mock venue
    ReplaceSource {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        protocol: String,
        #[arg(long, default_value_t = 500)]
        apy_bps: u64,
    },
}

#[derive(Subcommand)]
enum EmergencyCommand {
    Schedule {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        plan_id: u64,
        #[arg(long, default_value_t = 0)]
        amount: u64,
        #[arg(long)]
        reason: String,
    },
    Execute {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        id: String,
    },
    Cancel {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Param {
    Penalty,
    DeductionLimits,
    UserShare,
    PoolThreshold,
    EmergencyDelay,
    HarvestInterval,
}

/// 64 hex chars are taken as-is; any other label is hashed into an account id.
fn parse_account(label: &str) -> Result<AccountId> {
    let trimmed = label.trim_start_matches("0x");
    if trimmed.len() == 64 {
        let mut bytes = [0u8; 32];
        if hex::decode_to_slice(trimmed, &mut bytes).is_ok() {
            return Ok(bytes);
        }
    }
    if label.is_empty() {
        bail!("Empty account label");
    }
    Ok(*blake3::hash(label.as_bytes()).as_bytes())
}

fn parse_request_id(id: &str) -> Result<RequestId> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(id.trim_start_matches("0x"), &mut bytes)
        .map_err(|e| anyhow!("Invalid request id {}: {}", id, e))?;
    Ok(bytes)
}

fn param_instruction(name: Param, value: u64, max: Option<u64>) -> Result<LedgerInstruction> {
    Ok(match name {
        Param::Penalty => LedgerInstruction::SetEarlyWithdrawalPenalty { bps: value },
        Param::DeductionLimits => LedgerInstruction::SetDeductionLimits {
            min: value,
            max: max.ok_or_else(|| anyhow!("deduction-limits needs --max"))?,
        },
        Param::UserShare => LedgerInstruction::SetUserYieldShare { bps: value },
        Param::PoolThreshold => LedgerInstruction::SetMinPoolThreshold { amount: value },
        Param::EmergencyDelay => LedgerInstruction::SetEmergencyDelay { secs: value },
        Param::HarvestInterval => LedgerInstruction::SetHarvestInterval { secs: value },
    })
}

fn load_config(path: &Option<PathBuf>) -> Result<LedgerConfig> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(LedgerConfig::default()),
    }
}

fn wall_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct Session {
    storage: Storage,
    sandbox: Sandbox,
    now: u64,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let storage = Storage::open(&cli.data_dir).context("Failed to open storage")?;
        let sandbox = storage
            .load_sandbox()?
            .ok_or_else(|| anyhow!("No ledger at {}. Run `init` first.", cli.data_dir.display()))?;
        let now = cli.at.unwrap_or_else(|| wall_clock().max(sandbox.clock));
        Ok(Self {
            storage,
            sandbox,
            now,
        })
    }

    fn apply(&mut self, sender: &AccountId, instruction: LedgerInstruction) -> Result<()> {
        let result = self.sandbox.apply(sender, &instruction, self.now);
        // A halt from the accounting check must be persisted even though the call failed.
        self.storage.save_sandbox(&self.sandbox)?;
        let applied = result.map_err(|e| anyhow!("Instruction rejected: {}", e))?;
        self.record(&applied)
    }

    fn record(&self, applied: &Applied) -> Result<()> {
        self.storage.save_events(applied.sequence, &applied.events)?;
        println!("#{} {:?}", applied.sequence, applied.outcome);
        for event in &applied.events {
            println!("  {:?}", event);
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        self.storage.save_sandbox(&self.sandbox)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Commands::Init {
        admin,
        pool,
        config,
        protocol,
        apy_bps,
        no_yield_source,
    } = &cli.command
    {
        let storage = Storage::open(&cli.data_dir).context("Failed to open storage")?;
        if storage.load_sandbox()?.is_some() {
            bail!("A ledger already exists at {}", cli.data_dir.display());
        }
        let config = load_config(config)?;
        let pool_account = parse_account(pool)?;
        let now = cli.at.unwrap_or_else(wall_clock);
        let mut sandbox = Sandbox::new(parse_account(admin)?, pool_account, config, now)
            .map_err(|e| anyhow!("Invalid ledger parameters: {}", e))?;
        if !no_yield_source {
            let custody = *blake3::hash(protocol.as_bytes()).as_bytes();
            sandbox = sandbox.with_yield_source(MockYieldSource::new(protocol, custody, *apy_bps));
        }
        storage.save_sandbox(&sandbox)?;
        info!("Ledger initialized at {}", cli.data_dir.display());
        println!("Ledger initialized at {}", cli.data_dir.display());
        println!("Admin: {}", hex::encode(sandbox.state.admin));
        println!("Pool:  {}", hex::encode(pool_account));
        return Ok(());
    }

    let mut session = Session::open(&cli)?;

    match &cli.command {
        Commands::Init { .. } => bail!("A ledger already exists at {}", cli.data_dir.display()),
        Commands::Fund { account, amount } => {
            let account = parse_account(account)?;
            session
                .sandbox
                .fund(&account, *amount)
                .map_err(|e| anyhow!("Funding failed: {}", e))?;
            session.save()?;
            println!(
                "Funded {}: balance {}",
                hex::encode(account),
                session.sandbox.tokens.balance_of(&account)
            );
        }
        Commands::CreatePlan {
            owner,
            daily_amount,
            days,
        } => {
            let duration = PlanDuration::from_days(*days).map_err(|e| anyhow!("{}", e))?;
            session.apply(
                &parse_account(owner)?,
                LedgerInstruction::CreatePlan {
                    daily_amount: *daily_amount,
                    duration,
                },
            )?;
        }
        Commands::Deduct { plan_id, caller } => {
            session.apply(
                &parse_account(caller)?,
                LedgerInstruction::ExecuteDeduction { plan_id: *plan_id },
            )?;
        }
        Commands::Batch { plan_ids, caller } => {
            session.apply(
                &parse_account(caller)?,
                LedgerInstruction::ExecuteDeductionsBatch {
                    plan_ids: plan_ids.clone(),
                },
            )?;
        }
        Commands::Withdraw {
            owner,
            plan_id,
            amount,
        } => {
            session.apply(
                &parse_account(owner)?,
                LedgerInstruction::Withdraw {
                    plan_id: *plan_id,
                    amount: *amount,
                },
            )?;
        }
        Commands::ClaimYield { owner, plan_id } => {
            session.apply(
                &parse_account(owner)?,
                LedgerInstruction::ClaimYield { plan_id: *plan_id },
            )?;
        }
        Commands::Harvest { caller } => {
            session.apply(&parse_account(caller)?, LedgerInstruction::HarvestYield)?;
        }
        Commands::Accrue { secs } => {
            let interest = session
                .sandbox
                .accrue_yield(*secs)
                .map_err(|e| anyhow!("Accrual failed: {}", e))?;
            session.save()?;
            println!("Yield source earned {}", interest);
        }
        Commands::Admin(cmd) => run_admin(&mut session, cmd)?,
        Commands::Emergency(cmd) => run_emergency(&mut session, cmd)?,
        Commands::Show { plan_id } => show(&mut session, *plan_id)?,
        Commands::Status => {
            let now = session.now;
            let tolerance = session.sandbox.state.config.accounting_tolerance;
            let ctx = session.sandbox.context(now);
            let report = accounting_report(&ctx);
            println!("On hand:        {}", report.on_hand);
            match report.source_balance {
                Some(balance) => println!("Yield source:   {}", balance),
                None => println!("Yield source:   unreadable"),
            }
            println!("Liabilities:    {}", report.liabilities);
            println!("Solvent:        {:?}", report.is_solvent(tolerance));
            println!("Paused:         {}", ctx.state.paused);
        }
        Commands::Events { sequence } => match session.storage.load_events(*sequence)? {
            Some(events) if events.is_empty() => println!("#{}: no events", sequence),
            Some(events) => {
                for event in events {
                    println!("{:?}", event);
                }
            }
            None => println!("No instruction #{}", sequence),
        },
    }

    Ok(())
}

fn run_admin(session: &mut Session, cmd: &AdminCommand) -> Result<()> {
    match cmd {
        AdminCommand::SetParam {
            admin,
            name,
            value,
            max,
        } => session.apply(&parse_account(admin)?, param_instruction(*name, *value, *max)?),
        AdminCommand::SetKeeper {
            admin,
            keeper,
            disable,
        } => session.apply(
            &parse_account(admin)?,
            LedgerInstruction::SetKeeper {
                keeper: parse_account(keeper)?,
                enabled: !disable,
            },
        ),
        AdminCommand::ProposeAdmin { admin, proposed } => session.apply(
            &parse_account(admin)?,
            LedgerInstruction::ProposeAdmin {
                proposed: parse_account(proposed)?,
            },
        ),
        AdminCommand::AcceptAdmin { caller } => {
            session.apply(&parse_account(caller)?, LedgerInstruction::AcceptAdmin)
        }
        AdminCommand::Pause { admin } => session.apply(&parse_account(admin)?, LedgerInstruction::Pause),
        AdminCommand::Unpause { admin } => {
            session.apply(&parse_account(admin)?, LedgerInstruction::Unpause)
        }
        AdminCommand::WithdrawFees { admin, to, amount } => session.apply(
            &parse_account(admin)?,
            LedgerInstruction::WithdrawProtocolFees {
                to: parse_account(to)?,
                amount: *amount,
            },
        ),
        AdminCommand::ReplaceSource {
            admin,
            protocol,
            apy_bps,
        } => {
            let custody = *blake3::hash(protocol.as_bytes()).as_bytes();
            let candidate = MockYieldSource::new(protocol, custody, *apy_bps);
            let now = session.now;
            let (recovered, events) = session
                .sandbox
                .replace_yield_source(&parse_account(admin)?, candidate, now)
                .map_err(|e| anyhow!("Replacement rejected: {}", e))?;
            session.save()?;
            session.storage.save_events(session.sandbox.sequence, &events)?;
            println!("#{} recovered {} from previous source", session.sandbox.sequence, recovered);
            Ok(())
        }
    }
}

fn run_emergency(session: &mut Session, cmd: &EmergencyCommand) -> Result<()> {
    match cmd {
        EmergencyCommand::Schedule {
            admin,
            user,
            plan_id,
            amount,
            reason,
        } => session.apply(
            &parse_account(admin)?,
            LedgerInstruction::ScheduleEmergencyWithdrawal {
                user: parse_account(user)?,
                plan_id: *plan_id,
                amount: *amount,
                reason: reason.clone(),
            },
        ),
        EmergencyCommand::Execute { admin, id } => session.apply(
            &parse_account(admin)?,
            LedgerInstruction::ExecuteEmergencyWithdrawal {
                id: parse_request_id(id)?,
            },
        ),
        EmergencyCommand::Cancel { admin, id } => session.apply(
            &parse_account(admin)?,
            LedgerInstruction::CancelEmergencyWithdrawal {
                id: parse_request_id(id)?,
            },
        ),
    }
}

fn show(session: &mut Session, plan_id: Option<u64>) -> Result<()> {
    let now = session.now;
    let Some(plan_id) = plan_id else {
        let state = &session.sandbox.state;
        let pool = &state.pool;
        println!("Admin:              {}", hex::encode(state.admin));
        println!("Paused:             {}", state.paused);
        println!("Plans:              {}", pool.total_plans);
        println!("Total principal:    {}", pool.total_principal);
        println!("User yield:         {}", pool.total_user_yield);
        println!("Protocol yield:     {}", pool.total_protocol_yield);
        println!("Protocol fees owed: {}", pool.protocol_yield_outstanding());
        println!("Yield shares:       {}", pool.total_yield_shares);
        println!("Penalties kept:     {}", pool.penalties_forfeited);
        if let Some(source) = &session.sandbox.yield_source {
            println!(
                "Yield source:       {} ({} bps, balance {})",
                source.protocol_name,
                source.apy_bps,
                source.balance()
            );
        }
        for (id, request) in &state.emergency_requests {
            println!(
                "Emergency {}: plan {} executable at {} (executed: {}, cancelled: {})",
                hex::encode(id),
                request.plan_id,
                request.execution_time,
                request.executed,
                request.cancelled
            );
        }
        return Ok(());
    };

    let plan = session
        .sandbox
        .state
        .plan(plan_id)
        .map_err(|e| anyhow!("{}", e))?
        .clone();
    let ctx = session.sandbox.context(now);
    let pending = accumulated_yield_of(&ctx, plan_id).map_err(|e| anyhow!("{}", e))?;

    println!("Plan {}", plan.id);
    println!("  Owner:          {}", hex::encode(plan.owner));
    println!("  Daily amount:   {}", plan.daily_amount);
    println!("  Duration:       {} days", plan.duration.days());
    println!("  Start / end:    {} / {}", plan.start_date, plan.end_date);
    println!("  Target:         {}", plan.total_target);
    println!("  Balance:        {}", plan.accumulated_balance);
    println!("  Yield earned:   {}", plan.yield_earned);
    println!("  Pending yield:  {}", pending);
    println!(
        "  Deductions:     {} ok, {} missed",
        plan.successful_deductions, plan.missed_deductions
    );
    println!("  Next deduction: {}", plan.next_deduction_at());
    println!("  Active:         {}", plan.is_active);
    println!("  Completed:      {}", plan.is_completed);
    Ok(())
}
