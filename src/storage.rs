use crate::model::{
    CallOutId, CallOutLog, Registry, Role, Shift, ShiftId, ShiftStatus, User, UserId,
};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Résultat d'une mise à jour conditionnelle de shift.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// La condition était vraie : voici le shift après écriture.
    Applied(Shift),
    /// La condition était fausse : état courant, inchangé.
    Rejected(Shift),
    Missing,
}

/// Accès aux données. Toute implémentation doit être partageable entre threads.
pub trait Storage: Send + Sync {
    fn insert_user(&self, user: User) -> anyhow::Result<()>;
    fn find_user(&self, id: &UserId) -> anyhow::Result<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Modifie l'utilisateur sous verrou ; `None` s'il n'existe pas.
    fn update_user_with(
        &self,
        id: &UserId,
        edit: &mut dyn FnMut(&mut User),
    ) -> anyhow::Result<Option<User>>;
    fn list_users(&self) -> anyhow::Result<Vec<User>>;
    /// Utilisateurs d'un rôle, dans l'ordre d'insertion.
    fn users_by_role(&self, role: Role) -> anyhow::Result<Vec<User>>;

    fn find_shift(&self, id: &ShiftId) -> anyhow::Result<Option<Shift>>;
    fn list_shifts(&self) -> anyhow::Result<Vec<Shift>>;
    /// Shifts assignés à `user` dont le statut figure dans `statuses`.
    fn shifts_assigned_to(
        &self,
        user: &UserId,
        statuses: &[ShiftStatus],
    ) -> anyhow::Result<Vec<Shift>>;

    /// Crée le shift et son call-out ensemble : les deux ou aucun.
    fn insert_call_out(&self, shift: Shift, log: CallOutLog) -> anyhow::Result<()>;
    fn find_call_out(&self, id: &CallOutId) -> anyhow::Result<Option<CallOutLog>>;
    fn call_out_for_shift(&self, shift: &ShiftId) -> anyhow::Result<Option<CallOutLog>>;
    /// Call-outs acceptés par `user`.
    fn accepted_call_outs(&self, user: &UserId) -> anyhow::Result<Vec<CallOutLog>>;
    fn list_call_outs(&self) -> anyhow::Result<Vec<CallOutLog>>;
    fn update_call_out_with(
        &self,
        id: &CallOutId,
        edit: &mut dyn FnMut(&mut CallOutLog),
    ) -> anyhow::Result<Option<CallOutLog>>;

    /// OPEN → ASSIGNED en une seule écriture atomique, call-out lié compris.
    /// Équivaut à `UPDATE shift SET status='ASSIGNED' ... WHERE id=? AND status='OPEN'`.
    fn claim_shift(
        &self,
        id: &ShiftId,
        staff: &UserId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Transition>;

    /// Passe à `to` uniquement si le statut courant est dans `from`.
    fn transition_shift(
        &self,
        id: &ShiftId,
        from: &[ShiftStatus],
        to: ShiftStatus,
    ) -> anyhow::Result<Transition>;
}

/// Stockage en mémoire, verrou lecteurs/écrivain sur un `Registry`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<Registry>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self {
            state: RwLock::new(registry),
        }
    }

    pub fn snapshot(&self) -> Registry {
        self.state.read().clone()
    }

    fn restore(&self, registry: Registry) {
        *self.state.write() = registry;
    }
}

impl Storage for MemoryStorage {
    fn insert_user(&self, user: User) -> anyhow::Result<()> {
        let mut state = self.state.write();
        if state.find_user(&user.id).is_some() {
            bail!("duplicate user id: {}", user.id);
        }
        if state.find_user_by_email(&user.email).is_some() {
            bail!("duplicate email: {}", user.email);
        }
        state.users.push(user);
        Ok(())
    }

    fn find_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        Ok(self.state.read().find_user(id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.state.read().find_user_by_email(email).cloned())
    }

    fn update_user_with(
        &self,
        id: &UserId,
        edit: &mut dyn FnMut(&mut User),
    ) -> anyhow::Result<Option<User>> {
        let mut state = self.state.write();
        Ok(state.find_user_mut(id).map(|user| {
            edit(user);
            user.clone()
        }))
    }

    fn list_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.state.read().users.clone())
    }

    fn users_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        Ok(self
            .state
            .read()
            .users
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    fn find_shift(&self, id: &ShiftId) -> anyhow::Result<Option<Shift>> {
        Ok(self.state.read().find_shift(id).cloned())
    }

    fn list_shifts(&self) -> anyhow::Result<Vec<Shift>> {
        Ok(self.state.read().shifts.clone())
    }

    fn shifts_assigned_to(
        &self,
        user: &UserId,
        statuses: &[ShiftStatus],
    ) -> anyhow::Result<Vec<Shift>> {
        Ok(self
            .state
            .read()
            .shifts
            .iter()
            .filter(|s| s.assigned_to.as_ref() == Some(user) && statuses.contains(&s.status))
            .cloned()
            .collect())
    }

    fn insert_call_out(&self, shift: Shift, log: CallOutLog) -> anyhow::Result<()> {
        let mut state = self.state.write();
        if log.shift_id != shift.id {
            bail!("call-out {} does not reference shift {}", log.id, shift.id);
        }
        if state.find_shift(&shift.id).is_some() {
            bail!("duplicate shift id: {}", shift.id);
        }
        if state.find_call_out(&log.id).is_some() {
            bail!("duplicate call-out id: {}", log.id);
        }
        state.shifts.push(shift);
        state.call_outs.push(log);
        Ok(())
    }

    fn find_call_out(&self, id: &CallOutId) -> anyhow::Result<Option<CallOutLog>> {
        Ok(self.state.read().find_call_out(id).cloned())
    }

    fn call_out_for_shift(&self, shift: &ShiftId) -> anyhow::Result<Option<CallOutLog>> {
        Ok(self
            .state
            .read()
            .call_outs
            .iter()
            .find(|c| &c.shift_id == shift)
            .cloned())
    }

    fn accepted_call_outs(&self, user: &UserId) -> anyhow::Result<Vec<CallOutLog>> {
        Ok(self
            .state
            .read()
            .call_outs
            .iter()
            .filter(|c| c.accepted_by.as_ref() == Some(user))
            .cloned()
            .collect())
    }

    fn list_call_outs(&self) -> anyhow::Result<Vec<CallOutLog>> {
        Ok(self.state.read().call_outs.clone())
    }

    fn update_call_out_with(
        &self,
        id: &CallOutId,
        edit: &mut dyn FnMut(&mut CallOutLog),
    ) -> anyhow::Result<Option<CallOutLog>> {
        let mut state = self.state.write();
        Ok(state.find_call_out_mut(id).map(|log| {
            edit(log);
            log.clone()
        }))
    }

    fn claim_shift(
        &self,
        id: &ShiftId,
        staff: &UserId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Transition> {
        let mut state = self.state.write();
        let Some(shift) = state.find_shift_mut(id) else {
            return Ok(Transition::Missing);
        };
        if shift.status != ShiftStatus::Open {
            return Ok(Transition::Rejected(shift.clone()));
        }
        shift.status = ShiftStatus::Assigned;
        shift.assigned_to = Some(staff.clone());
        let claimed = shift.clone();

        for log in state.call_outs.iter_mut().filter(|c| &c.shift_id == id) {
            log.fill(staff.clone(), at);
        }
        Ok(Transition::Applied(claimed))
    }

    fn transition_shift(
        &self,
        id: &ShiftId,
        from: &[ShiftStatus],
        to: ShiftStatus,
    ) -> anyhow::Result<Transition> {
        let mut state = self.state.write();
        let Some(shift) = state.find_shift_mut(id) else {
            return Ok(Transition::Missing);
        };
        if !from.contains(&shift.status) || !shift.status.can_transition_to(to) {
            return Ok(Transition::Rejected(shift.clone()));
        }
        shift.status = to;
        Ok(Transition::Applied(shift.clone()))
    }
}

/// Registry persisté dans un fichier JSON, réécrit de manière atomique après chaque mutation.
pub struct JsonStorage {
    path: PathBuf,
    inner: MemoryStorage,
    /// Lecteurs en partage, mutation + écriture du fichier en exclusif.
    gate: RwLock<()>,
}

impl JsonStorage {
    /// Ouvre le fichier s'il existe, sinon démarre vide.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let registry = if path.exists() {
            load_registry(&path)?
        } else {
            Registry::default()
        };
        Ok(Self {
            path,
            inner: MemoryStorage::from_registry(registry),
            gate: RwLock::new(()),
        })
    }

    pub fn snapshot(&self) -> Registry {
        self.read(MemoryStorage::snapshot)
    }

    /// Aucune lecture ne voit une mutation pas encore écrite sur disque.
    fn read<T>(&self, op: impl FnOnce(&MemoryStorage) -> T) -> T {
        let _guard = self.gate.read();
        op(&self.inner)
    }

    /// Applique `op` puis écrit le fichier ; en cas d'échec d'écriture, l'état mémoire est restauré.
    fn mutate<T>(&self, op: impl FnOnce(&MemoryStorage) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let _guard = self.gate.write();
        let before = self.inner.snapshot();
        let out = op(&self.inner)?;
        if let Err(err) = save_registry(&self.path, &self.inner.snapshot()) {
            self.inner.restore(before);
            return Err(err);
        }
        Ok(out)
    }
}

impl Storage for JsonStorage {
    fn insert_user(&self, user: User) -> anyhow::Result<()> {
        self.mutate(|m| m.insert_user(user))
    }
    fn find_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        self.read(|m| m.find_user(id))
    }
    fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.read(|m| m.find_user_by_email(email))
    }
    fn update_user_with(
        &self,
        id: &UserId,
        edit: &mut dyn FnMut(&mut User),
    ) -> anyhow::Result<Option<User>> {
        self.mutate(|m| m.update_user_with(id, edit))
    }
    fn list_users(&self) -> anyhow::Result<Vec<User>> {
        self.read(|m| m.list_users())
    }
    fn users_by_role(&self, role: Role) -> anyhow::Result<Vec<User>> {
        self.read(|m| m.users_by_role(role))
    }
    fn find_shift(&self, id: &ShiftId) -> anyhow::Result<Option<Shift>> {
        self.read(|m| m.find_shift(id))
    }
    fn list_shifts(&self) -> anyhow::Result<Vec<Shift>> {
        self.read(|m| m.list_shifts())
    }
    fn shifts_assigned_to(
        &self,
        user: &UserId,
        statuses: &[ShiftStatus],
    ) -> anyhow::Result<Vec<Shift>> {
        self.read(|m| m.shifts_assigned_to(user, statuses))
    }
    fn insert_call_out(&self, shift: Shift, log: CallOutLog) -> anyhow::Result<()> {
        self.mutate(|m| m.insert_call_out(shift, log))
    }
    fn find_call_out(&self, id: &CallOutId) -> anyhow::Result<Option<CallOutLog>> {
        self.read(|m| m.find_call_out(id))
    }
    fn call_out_for_shift(&self, shift: &ShiftId) -> anyhow::Result<Option<CallOutLog>> {
        self.read(|m| m.call_out_for_shift(shift))
    }
    fn accepted_call_outs(&self, user: &UserId) -> anyhow::Result<Vec<CallOutLog>> {
        self.read(|m| m.accepted_call_outs(user))
    }
    fn list_call_outs(&self) -> anyhow::Result<Vec<CallOutLog>> {
        self.read(|m| m.list_call_outs())
    }
    fn update_call_out_with(
        &self,
        id: &CallOutId,
        edit: &mut dyn FnMut(&mut CallOutLog),
    ) -> anyhow::Result<Option<CallOutLog>> {
        self.mutate(|m| m.update_call_out_with(id, edit))
    }
    fn claim_shift(
        &self,
        id: &ShiftId,
        staff: &UserId,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Transition> {
        self.mutate(|m| m.claim_shift(id, staff, at))
    }
    fn transition_shift(
        &self,
        id: &ShiftId,
        from: &[ShiftStatus],
        to: ShiftStatus,
    ) -> anyhow::Result<Transition> {
        self.mutate(|m| m.transition_shift(id, from, to))
    }
}

pub fn load_registry(path: &Path) -> anyhow::Result<Registry> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let registry: Registry =
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(registry)
}

/// Sauvegarde de manière atomique (fichier temporaire + rename).
pub fn save_registry(path: &Path, registry: &Registry) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(registry)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).with_context(|| "atomic rename")?;
    Ok(())
}
