use crate::model::{Registry, Role, User, UserStatus};
use anyhow::{bail, Context};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::Path;

/// Import d'utilisateurs depuis CSV: header `email,role[,active][,status]`
pub fn import_users_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<User>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let email = rec.get(0).context("missing email")?.trim();
        let role = rec.get(1).context("missing role")?.trim();
        if email.is_empty() || role.is_empty() {
            bail!("invalid user row (empty)");
        }
        let role: Role = role.parse().map_err(anyhow::Error::msg)?;
        let mut user = User::new(email.to_string(), role);
        if let Some(flag) = rec.get(2) {
            let flag = flag.trim();
            if !flag.is_empty() {
                user.active = parse_bool(flag)
                    .with_context(|| format!("invalid active value for {email}"))?;
            }
        }
        if let Some(status) = rec.get(3) {
            let status = status.trim();
            if !status.is_empty() {
                user.status = status
                    .parse::<UserStatus>()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("invalid status value for {email}"))?;
            }
        }
        out.push(user);
    }
    Ok(out)
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => bail!("expected boolean"),
    }
}

/// Export JSON du registry (jolie mise en forme)
pub fn export_registry_json<P: AsRef<Path>>(path: P, registry: &Registry) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(registry)?;
    fs::write(path, s)?;
    Ok(())
}

/// Export CSV des shifts: header `id,required_skill,start,end,status,assigned_email`
pub fn export_shifts_csv<P: AsRef<Path>>(path: P, registry: &Registry) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record(["id", "required_skill", "start", "end", "status", "assigned_email"])?;
    for s in &registry.shifts {
        let assigned = s
            .assigned_to
            .as_ref()
            .and_then(|id| registry.find_user(id))
            .map(|u| u.email.as_str())
            .unwrap_or("");
        let start = s.start.to_rfc3339();
        let end = s.end.to_rfc3339();
        w.write_record([
            s.id.as_str(),
            s.required_skill.as_str(),
            start.as_str(),
            end.as_str(),
            s.status.as_str(),
            assigned,
        ])?;
    }
    w.flush()?;
    Ok(())
}
