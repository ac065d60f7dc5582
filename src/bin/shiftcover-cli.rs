#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shiftcover::{
    io,
    model::{Actor, CallOutId, Role, ShiftId, User, UserStatus},
    notification::LogBroadcaster,
    scheduler::{format_response_time, ConflictPolicy, EngineOptions, ErrorKind, MatchBand},
    storage::{JsonStorage, Storage},
    JsonlAuditLog, SchedError, Scheduler,
};
use std::sync::Arc;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de couverture des absences (stockage JSON local)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON des données
    #[arg(long, global = true, default_value = "shiftcover.json")]
    store: String,

    /// Journal d'audit (JSON lines)
    #[arg(long, global = true, default_value = "audit.jsonl")]
    audit: String,

    /// Taille du pool de calcul
    #[arg(long, global = true, default_value_t = 4)]
    workers: usize,

    /// Ignore les erreurs de lecture lors de la détection de conflits
    #[arg(long, global = true)]
    fail_open: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Créer un utilisateur
    AddUser {
        #[arg(long)]
        email: String,
        /// STAFF, MANAGER ou ADMIN
        #[arg(long, default_value = "STAFF")]
        role: String,
    },

    /// Importer des utilisateurs depuis un CSV
    ImportUsers {
        #[arg(long)]
        csv: String,
    },

    /// Signaler une absence et ouvrir le shift de remplacement
    CallOut {
        /// Email de la personne absente
        #[arg(long)]
        staff: String,
        #[arg(long)]
        skill: String,
        /// RFC3339 UTC
        #[arg(long)]
        start: String,
        /// RFC3339 UTC
        #[arg(long)]
        end: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Accepter un shift ouvert
    Accept {
        #[arg(long)]
        shift_id: String,
        /// Email de l'acteur
        #[arg(long = "as")]
        actor: String,
    },

    /// Annuler un shift
    CancelShift {
        #[arg(long)]
        shift_id: String,
        #[arg(long = "as")]
        actor: String,
    },

    /// Annuler un call-out
    CancelCallOut {
        #[arg(long)]
        call_out_id: String,
        #[arg(long = "as")]
        actor: String,
    },

    /// Suggérer des remplaçants pour un créneau
    Suggest {
        #[arg(long)]
        skill: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Email à exclure (la personne absente)
        #[arg(long)]
        exclude: Option<String>,
        /// Sortie JSON complète
        #[arg(long)]
        json: bool,
    },

    /// Statistiques de fiabilité d'un utilisateur
    Reliability {
        #[arg(long)]
        user: String,
    },

    /// Changer le statut d'un compte (admin)
    SetStatus {
        #[arg(long)]
        user: String,
        #[arg(long = "as")]
        actor: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },

    /// Lister et optionnellement exporter
    List {
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
        /// Seulement les shifts ouverts
        #[arg(long)]
        open: bool,
    },

    /// Tableau de bord
    Stats,
}

fn main() {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let code = match run(cli) {
        Ok(()) => 0,
        Err(err) => report(&err),
    };
    std::process::exit(code);
}

/// Message stable et code de sortie par famille d'erreur.
fn report(err: &anyhow::Error) -> i32 {
    let Some(sched) = err.downcast_ref::<SchedError>() else {
        eprintln!("error: {err:#}");
        return 1;
    };
    let (code, message) = match sched.kind() {
        ErrorKind::Validation => (1, format!("invalid request: {sched}")),
        ErrorKind::Conflict => (2, format!("shift no longer available: {sched}")),
        ErrorKind::NotFound => (3, format!("not found: {sched}")),
        ErrorKind::Forbidden => (4, "not authorized".to_string()),
        ErrorKind::Internal => (1, format!("internal error: {sched}")),
    };
    eprintln!("{message}");
    code
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse()
        .with_context(|| format!("invalid RFC3339 timestamp: {raw}"))
}

fn lookup(storage: &dyn Storage, email: &str) -> Result<User> {
    match storage.find_user_by_email(email)? {
        Some(user) => Ok(user),
        None => Err(SchedError::UnknownUser(email.to_string()).into()),
    }
}

fn resolve_actor(storage: &dyn Storage, email: &str) -> Result<Actor> {
    Ok(Actor::from(&lookup(storage, email)?))
}

fn run(cli: Cli) -> Result<()> {
    let storage = Arc::new(JsonStorage::open(&cli.store)?);
    let options = EngineOptions {
        max_workers: cli.workers,
        conflict_policy: if cli.fail_open {
            ConflictPolicy::FailOpen
        } else {
            ConflictPolicy::FailClosed
        },
    };
    let scheduler = Scheduler::builder(storage.clone())
        .broadcaster(Arc::new(LogBroadcaster))
        .audit(Arc::new(JsonlAuditLog::new(&cli.audit)))
        .options(options)
        .build()?;
    let store: &dyn Storage = storage.as_ref();

    match cli.cmd {
        Commands::AddUser { email, role } => {
            let role: Role = role.parse().map_err(anyhow::Error::msg)?;
            let user = scheduler.register_user(&email, role)?;
            println!("{}", user.id);
        }
        Commands::ImportUsers { csv } => {
            let summary = scheduler.import_users(io::import_users_csv(csv)?)?;
            println!("imported {} user(s)", summary.imported.len());
            for email in &summary.skipped {
                eprintln!("skipped {email}: already registered");
            }
        }
        Commands::CallOut {
            staff,
            skill,
            start,
            end,
            reason,
        } => {
            let caller = lookup(store, &staff)?;
            let shift = scheduler.create_call_out(
                &caller.id,
                &skill,
                parse_time(&start)?,
                parse_time(&end)?,
                reason.as_deref(),
            )?;
            println!("{}", shift.id);
        }
        Commands::Accept { shift_id, actor: who } => {
            let actor = resolve_actor(store, &who)?;
            scheduler.accept_shift(&ShiftId::new(shift_id), &actor)?;
            scheduler.wait_for_background();
            println!("accepted");
        }
        Commands::CancelShift { shift_id, actor: who } => {
            let actor = resolve_actor(store, &who)?;
            let shift = scheduler.cancel_shift(&ShiftId::new(shift_id), &actor)?;
            println!("{} {}", shift.id, shift.status);
        }
        Commands::CancelCallOut {
            call_out_id,
            actor: who,
        } => {
            let actor = resolve_actor(store, &who)?;
            let log = scheduler.cancel_call_out(&CallOutId::new(call_out_id), &actor)?;
            println!("{} cancelled", log.id);
        }
        Commands::Suggest {
            skill,
            start,
            end,
            exclude,
            json,
        } => {
            let exclude = match exclude {
                Some(email) => Some(lookup(store, &email)?.id),
                None => None,
            };
            let suggestion = scheduler.suggest_staff(
                &skill,
                parse_time(&start)?,
                parse_time(&end)?,
                exclude.as_ref(),
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&suggestion)?);
            } else {
                for m in &suggestion.recommended_staff {
                    println!(
                        "{:>3} | {:<15} | {} | {}",
                        m.score,
                        MatchBand::of(m.score).label(),
                        m.staff.email,
                        m.reasons.join("; ")
                    );
                }
                for warning in &suggestion.conflict_warnings {
                    eprintln!("warning: {warning}");
                }
                println!("available: {}", suggestion.total_available_staff);
            }
        }
        Commands::Reliability { user } => {
            let user = lookup(store, &user)?;
            let stats = scheduler.get_reliability(&user.id)?;
            println!(
                "{} | score {:.2} | {} shift(s), {} missed | completion {:.0}% | response {}",
                user.email,
                stats.score,
                stats.total_shifts,
                stats.missed_shifts,
                stats.completion_rate * 100.0,
                format_response_time(stats.avg_response_time_minutes)
            );
        }
        Commands::SetStatus {
            user,
            actor: who,
            status,
            active,
        } => {
            let actor = resolve_actor(store, &who)?;
            let target = lookup(store, &user)?;
            let status = status
                .map(|s| s.parse::<UserStatus>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let updated = scheduler.update_user_status(&actor, &target.id, status, active)?;
            println!(
                "{} {} active={}",
                updated.email,
                updated.status.as_str(),
                updated.active
            );
        }
        Commands::List {
            out_json,
            out_csv,
            open,
        } => {
            let registry = storage.snapshot();
            if let Some(path) = out_json {
                io::export_registry_json(path, &registry)?;
            }
            if let Some(path) = out_csv {
                io::export_shifts_csv(path, &registry)?;
            }
            let shifts = if open {
                scheduler.open_shifts()?
            } else {
                registry.shifts.clone()
            };
            // impression compacte
            for s in &shifts {
                let assigned = s
                    .assigned_to
                    .as_ref()
                    .and_then(|id| registry.find_user(id))
                    .map(|u| u.email.as_str())
                    .unwrap_or("-");
                println!(
                    "{} | {} | {} → {} | {} | {}",
                    s.id,
                    s.required_skill,
                    s.start.to_rfc3339(),
                    s.end.to_rfc3339(),
                    s.status,
                    assigned
                );
            }
        }
        Commands::Stats => {
            let stats = scheduler.dashboard_stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
