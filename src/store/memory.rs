//! In-memory `Store` used by the unit tests. Every method takes the table
//! lock once, so each call is atomic the same way a single SQL statement is.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Assignment, AssignmentFilter, AssignmentPatch, AssignmentStatus, Citizen, Complaint,
    ComplaintStatus, Department, EscalationLevel, NewAssignment, Resource, ResourceStatus, Worker,
    WorkerStatus,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub complaints: BTreeMap<i64, Complaint>,
    pub citizens: BTreeMap<i64, Citizen>,
    pub workers: BTreeMap<i64, Worker>,
    pub resources: BTreeMap<i64, Resource>,
    pub assignments: BTreeMap<i64, Assignment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn release(&mut self, worker_ids: &[i64], resource_ids: &[i64]) {
        for id in worker_ids {
            if let Some(w) = self.workers.get_mut(id) {
                w.status = WorkerStatus::Available;
            }
        }
        for id in resource_ids {
            if let Some(r) = self.resources.get_mut(id) {
                r.status = ResourceStatus::Available;
            }
        }
    }
}

#[derive(Default)]
struct Faults {
    escalation: HashSet<i64>,
    overdue_flag: HashSet<i64>,
    complaint_overdue: HashSet<i64>,
    transition: HashSet<i64>,
    rejection: HashSet<i64>,
    delete: HashSet<i64>,
    insert_assignment: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn faults(&self) -> StoreResult<MutexGuard<'_, Faults>> {
        self.faults.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    // ── seeding (intake and directory live elsewhere) ─────────────────────

    pub fn seed_citizen(&self, first_name: &str) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.citizens.insert(
            id,
            Citizen {
                citizen_id: id,
                first_name: first_name.to_string(),
                last_name: "Doe".to_string(),
                email: format!("{}@example.org", first_name.to_lowercase()),
                warnings: 0,
                approved: true,
            },
        );
        id
    }

    pub fn seed_complaint(&self, citizen_id: i64, created_at: DateTime<Utc>) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.complaints.insert(
            id,
            Complaint {
                complaint_id: id,
                citizen_id,
                department: Department::WaterSupply,
                status: ComplaintStatus::Open,
                escalation_level: EscalationLevel::Staff,
                location: "Ward 12, Main Road".to_string(),
                description: "Burst pipe flooding the street".to_string(),
                created_at,
                ladder_started_at: created_at,
                escalated_at: None,
                resolved_at: None,
                overdue: false,
                updated_at: created_at,
            },
        );
        id
    }

    pub fn seed_worker(&self, name: &str, status: WorkerStatus) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.workers.insert(
            id,
            Worker {
                worker_id: id,
                name: name.to_string(),
                email: format!("{}@works.example.org", name.to_lowercase()),
                department: Department::WaterSupply.to_string(),
                status,
            },
        );
        id
    }

    pub fn seed_resource(&self, name: &str, status: ResourceStatus) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.resources.insert(
            id,
            Resource {
                resource_id: id,
                name: name.to_string(),
                department: Department::WaterSupply.to_string(),
                category: "Vehicle".to_string(),
                status,
            },
        );
        id
    }

    pub fn edit_complaint(&self, id: i64, f: impl FnOnce(&mut Complaint)) {
        let mut t = self.tables.lock().unwrap();
        f(t.complaints.get_mut(&id).expect("seeded complaint"));
    }

    pub fn edit_assignment(&self, id: i64, f: impl FnOnce(&mut Assignment)) {
        let mut t = self.tables.lock().unwrap();
        f(t.assignments.get_mut(&id).expect("stored assignment"));
    }

    pub fn worker_status(&self, id: i64) -> WorkerStatus {
        self.tables.lock().unwrap().workers[&id].status
    }

    pub fn resource_status(&self, id: i64) -> ResourceStatus {
        self.tables.lock().unwrap().resources[&id].status
    }

    // ── fault injection ───────────────────────────────────────────────────

    pub fn fail_escalation_of(&self, complaint_id: i64) {
        self.faults.lock().unwrap().escalation.insert(complaint_id);
    }

    pub fn fail_overdue_flag_of(&self, assignment_id: i64) {
        self.faults.lock().unwrap().overdue_flag.insert(assignment_id);
    }

    pub fn fail_next_insert(&self) {
        self.faults.lock().unwrap().insert_assignment = true;
    }

    pub fn fail_complaint_overdue_of(&self, complaint_id: i64) {
        self.faults.lock().unwrap().complaint_overdue.insert(complaint_id);
    }

    pub fn fail_transition_of(&self, complaint_id: i64) {
        self.faults.lock().unwrap().transition.insert(complaint_id);
    }

    pub fn fail_rejection_of(&self, complaint_id: i64) {
        self.faults.lock().unwrap().rejection.insert(complaint_id);
    }

    pub fn fail_delete_of(&self, assignment_id: i64) {
        self.faults.lock().unwrap().delete.insert(assignment_id);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }
}

fn injected(what: &str, id: i64) -> StoreError {
    StoreError::Corrupt(format!("injected {what} failure for {id}"))
}

#[async_trait]
impl Store for MemoryStore {
    async fn complaint(&self, id: i64) -> StoreResult<Option<Complaint>> {
        Ok(self.lock()?.complaints.get(&id).cloned())
    }

    async fn escalation_candidates(
        &self,
        level: EscalationLevel,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Complaint>> {
        let t = self.lock()?;
        let mut rows: Vec<_> = t
            .complaints
            .values()
            .filter(|c| {
                c.escalation_level == level
                    && c.ladder_started_at <= started_before
                    && !c.status.is_terminal()
            })
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.ladder_started_at);
        Ok(rows)
    }

    async fn escalate_complaint(
        &self,
        id: i64,
        from: EscalationLevel,
        to: EscalationLevel,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if self.faults()?.escalation.contains(&id) {
            return Err(injected("escalation", id));
        }
        let mut t = self.lock()?;
        match t.complaints.get_mut(&id) {
            Some(c) if c.escalation_level == from && !c.status.is_terminal() => {
                c.escalation_level = to;
                c.escalated_at = Some(at);
                c.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn escalated_complaints(&self, level: EscalationLevel) -> StoreResult<Vec<Complaint>> {
        let t = self.lock()?;
        let mut rows: Vec<_> = t
            .complaints
            .values()
            .filter(|c| c.escalation_level == level && !c.status.is_terminal())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.escalated_at.cmp(&a.escalated_at));
        Ok(rows)
    }

    async fn overdue_complaints(&self) -> StoreResult<Vec<Complaint>> {
        let t = self.lock()?;
        let mut rows: Vec<_> = t.complaints.values().filter(|c| c.overdue).cloned().collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn transition_complaint(
        &self,
        id: i64,
        from: &[ComplaintStatus],
        to: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Complaint>> {
        if self.faults()?.transition.contains(&id) {
            return Err(injected("transition", id));
        }
        let mut t = self.lock()?;
        match t.complaints.get_mut(&id) {
            Some(c) if from.contains(&c.status) => {
                c.status = to;
                if to == ComplaintStatus::Resolved {
                    c.resolved_at = Some(at);
                }
                c.updated_at = at;
                Ok(Some(c.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reassign_complaint(
        &self,
        id: i64,
        department: Department,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Complaint>> {
        let mut t = self.lock()?;
        match t.complaints.get_mut(&id) {
            Some(c) if !c.status.is_terminal() => {
                c.department = department;
                c.escalation_level = EscalationLevel::Staff;
                c.escalated_at = None;
                c.ladder_started_at = at;
                c.updated_at = at;
                Ok(Some(c.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_complaint_overdue(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        if self.faults()?.complaint_overdue.contains(&id) {
            return Err(injected("complaint overdue", id));
        }
        if let Some(c) = self.lock()?.complaints.get_mut(&id) {
            c.overdue = true;
            c.updated_at = at;
        }
        Ok(())
    }

    async fn reject_complaint(
        &self,
        id: i64,
        freeze_at: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<(Complaint, Citizen)>> {
        if self.faults()?.rejection.contains(&id) {
            return Err(injected("rejection", id));
        }
        let mut t = self.lock()?;
        let Some(citizen_id) = t
            .complaints
            .get(&id)
            .filter(|c| !c.status.is_terminal())
            .map(|c| c.citizen_id)
        else {
            return Ok(None);
        };
        let Some(citizen) = t.citizens.get_mut(&citizen_id) else {
            return Ok(None);
        };
        citizen.warnings += 1;
        if citizen.warnings >= freeze_at {
            citizen.approved = false;
        }
        let citizen = citizen.clone();
        let Some(complaint) = t.complaints.get_mut(&id) else {
            return Ok(None);
        };
        complaint.status = ComplaintStatus::Rejected;
        complaint.updated_at = at;
        Ok(Some((complaint.clone(), citizen)))
    }

    async fn citizen(&self, id: i64) -> StoreResult<Option<Citizen>> {
        Ok(self.lock()?.citizens.get(&id).cloned())
    }

    async fn workers(&self, ids: &[i64]) -> StoreResult<Vec<Worker>> {
        let t = self.lock()?;
        Ok(ids.iter().filter_map(|id| t.workers.get(id).cloned()).collect())
    }

    async fn resources(&self, ids: &[i64]) -> StoreResult<Vec<Resource>> {
        let t = self.lock()?;
        Ok(ids.iter().filter_map(|id| t.resources.get(id).cloned()).collect())
    }

    async fn reserve(&self, worker_ids: &[i64], resource_ids: &[i64]) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let workers_free = worker_ids.iter().all(|id| {
            t.workers.get(id).map_or(false, |w| w.status == WorkerStatus::Available)
        });
        let resources_free = resource_ids.iter().all(|id| {
            t.resources.get(id).map_or(false, |r| r.status == ResourceStatus::Available)
        });
        if !(workers_free && resources_free) {
            return Ok(false);
        }
        for id in worker_ids {
            if let Some(w) = t.workers.get_mut(id) {
                w.status = WorkerStatus::OnDuty;
            }
        }
        for id in resource_ids {
            if let Some(r) = t.resources.get_mut(id) {
                r.status = ResourceStatus::InUse;
            }
        }
        Ok(true)
    }

    async fn release(&self, worker_ids: &[i64], resource_ids: &[i64]) -> StoreResult<()> {
        self.lock()?.release(worker_ids, resource_ids);
        Ok(())
    }

    async fn insert_assignment(&self, new: NewAssignment) -> StoreResult<Assignment> {
        {
            let mut faults = self.faults()?;
            if faults.insert_assignment {
                faults.insert_assignment = false;
                return Err(injected("insert", new.complaint_id));
            }
        }
        let mut t = self.lock()?;
        let id = t.next_id();
        let now = Utc::now();
        let row = Assignment {
            assignment_id: id,
            complaint_id: new.complaint_id,
            worker_ids: new.worker_ids,
            resource_ids: new.resource_ids,
            department: new.department,
            location: new.location,
            description: new.description,
            status: AssignmentStatus::Active,
            start_date: new.start_date,
            end_date: new.end_date,
            login_id: Some(new.login_id),
            login_password_hash: Some(new.login_password_hash),
            otp_hash: Some(new.otp_hash),
            otp_expires_at: Some(new.otp_expires_at),
            overdue: false,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        t.assignments.insert(id, row.clone());
        Ok(row)
    }

    async fn assignment(&self, id: i64) -> StoreResult<Option<Assignment>> {
        Ok(self.lock()?.assignments.get(&id).cloned())
    }

    async fn assignment_by_login(&self, login_id: &str) -> StoreResult<Option<Assignment>> {
        let t = self.lock()?;
        Ok(t.assignments
            .values()
            .find(|a| a.login_id.as_deref() == Some(login_id))
            .cloned())
    }

    async fn active_assignment_for(&self, complaint_id: i64) -> StoreResult<Option<Assignment>> {
        let t = self.lock()?;
        Ok(t.assignments
            .values()
            .find(|a| a.complaint_id == complaint_id && a.is_active())
            .cloned())
    }

    async fn assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let t = self.lock()?;
        Ok(t.assignments.values().rev().filter(|a| filter.matches(a)).cloned().collect())
    }

    async fn update_assignment(
        &self,
        id: i64,
        patch: &AssignmentPatch,
    ) -> StoreResult<Option<Assignment>> {
        let mut t = self.lock()?;
        Ok(t.assignments.get_mut(&id).map(|a| {
            if let Some(d) = patch.department {
                a.department = d;
            }
            if let Some(l) = &patch.location {
                a.location = l.clone();
            }
            if let Some(s) = patch.start_date {
                a.start_date = s;
            }
            if let Some(e) = patch.end_date {
                a.end_date = e;
            }
            if let Some(d) = &patch.description {
                a.description = Some(d.clone());
            }
            a.updated_at = Utc::now();
            a.clone()
        }))
    }

    async fn delete_assignment(&self, id: i64) -> StoreResult<Option<Assignment>> {
        if self.faults()?.delete.contains(&id) {
            return Err(injected("delete", id));
        }
        let mut t = self.lock()?;
        let removed = t.assignments.remove(&id);
        if let Some(a) = removed.as_ref().filter(|a| a.is_active()) {
            t.release(&a.worker_ids, &a.resource_ids);
        }
        Ok(removed)
    }

    async fn close_assignment(&self, id: i64, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let (workers, resources) = match t.assignments.get_mut(&id) {
            Some(a) if a.is_active() => {
                a.status = AssignmentStatus::Resolved;
                a.login_id = None;
                a.login_password_hash = None;
                a.otp_hash = None;
                a.otp_expires_at = None;
                a.updated_at = at;
                (a.worker_ids.clone(), a.resource_ids.clone())
            }
            _ => return Ok(false),
        };
        t.release(&workers, &resources);
        Ok(true)
    }

    async fn overdue_candidates(
        &self,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Assignment>> {
        let t = self.lock()?;
        Ok(t.assignments
            .values()
            .filter(|a| a.is_active() && !a.overdue && a.start_date <= started_before)
            .cloned()
            .collect())
    }

    async fn flag_assignment_overdue(&self, id: i64) -> StoreResult<bool> {
        if self.faults()?.overdue_flag.contains(&id) {
            return Err(injected("overdue flag", id));
        }
        let mut t = self.lock()?;
        match t.assignments.get_mut(&id) {
            Some(a) if !a.overdue => {
                a.overdue = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_reminder_sent(&self, id: i64) -> StoreResult<()> {
        if let Some(a) = self.lock()?.assignments.get_mut(&id) {
            a.reminder_sent = true;
        }
        Ok(())
    }
}
