//! Catalog metadata (C2): queryable descriptions of tables, columns, views, functions,
//! and jobs. Grounded on the teacher's `Catalog` struct in `storage.rs`, generalized to
//! per-tenant partitioning and extended with the row shapes SPEC_FULL.md's Data Model
//! expansion defines for views/functions/jobs.

use std::collections::HashMap;

use crate::types::Schema;

/// A row describing a registered view.
#[derive(Debug, Clone)]
pub struct CatalogView {
    pub name: String,
    pub definition: String,
}

/// A row describing a registered scalar function (name + arity; tinySQL's function set
/// is the fixed builtin set in `executor::evaluator`, so this is metadata only).
#[derive(Debug, Clone)]
pub struct CatalogFunction {
    pub name: String,
    pub arity: usize,
}

/// When a job fires. `Cron` uses a `croner` expression evaluated in `tz` (an IANA name,
/// e.g. "UTC"); `Interval` fires every `ms` milliseconds, catching up missed firings
/// when `catch_up` is set instead of resetting from "now"; `Once` fires a single time.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    Cron { expr: String, tz: String },
    Interval { ms: u64, catch_up: bool },
    Once { at_millis: i64 },
}

/// A row describing a scheduled job (see `scheduler.rs`).
#[derive(Debug, Clone)]
pub struct CatalogJob {
    pub name: String,
    pub sql: String,
    pub schedule: JobSchedule,
    pub enabled: bool,
    pub no_overlap: bool,
    pub max_runtime_ms: Option<u64>,
    pub last_run_at: Option<i64>,
    pub next_run_at: Option<i64>,
    pub last_error: Option<String>,
}

/// Per-tenant catalog: table schemas plus the view/function/job metadata tables.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tenants: HashMap<String, TenantCatalog>,
}

#[derive(Debug, Clone, Default)]
struct TenantCatalog {
    tables: HashMap<String, Schema>,
    views: HashMap<String, CatalogView>,
    functions: HashMap<String, CatalogFunction>,
    jobs: HashMap<String, CatalogJob>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn tenant(&self, tenant: &str) -> Option<&TenantCatalog> {
        self.tenants.get(tenant)
    }

    fn tenant_mut(&mut self, tenant: &str) -> &mut TenantCatalog {
        self.tenants.entry(tenant.to_string()).or_default()
    }

    pub fn put_table(&mut self, tenant: &str, schema: Schema) {
        self.tenant_mut(tenant).tables.insert(schema.name.clone(), schema);
    }

    pub fn drop_table(&mut self, tenant: &str, table: &str) {
        if let Some(t) = self.tenants.get_mut(tenant) {
            t.tables.remove(table);
        }
    }

    pub fn tables(&self, tenant: &str) -> Vec<&Schema> {
        self.tenant(tenant).map(|t| t.tables.values().collect()).unwrap_or_default()
    }

    pub fn table(&self, tenant: &str, name: &str) -> Option<&Schema> {
        self.tenant(tenant).and_then(|t| t.tables.get(name))
    }

    pub fn columns(&self, tenant: &str, table: &str) -> Vec<String> {
        self.table(tenant, table).map(|s| s.column_names()).unwrap_or_default()
    }

    pub fn put_view(&mut self, tenant: &str, view: CatalogView) {
        self.tenant_mut(tenant).views.insert(view.name.clone(), view);
    }

    pub fn views(&self, tenant: &str) -> Vec<&CatalogView> {
        self.tenant(tenant).map(|t| t.views.values().collect()).unwrap_or_default()
    }

    pub fn put_function(&mut self, tenant: &str, func: CatalogFunction) {
        self.tenant_mut(tenant).functions.insert(func.name.clone(), func);
    }

    pub fn functions(&self, tenant: &str) -> Vec<&CatalogFunction> {
        self.tenant(tenant).map(|t| t.functions.values().collect()).unwrap_or_default()
    }

    pub fn put_job(&mut self, tenant: &str, job: CatalogJob) {
        self.tenant_mut(tenant).jobs.insert(job.name.clone(), job);
    }

    pub fn remove_job(&mut self, tenant: &str, name: &str) {
        if let Some(t) = self.tenants.get_mut(tenant) {
            t.jobs.remove(name);
        }
    }

    pub fn jobs(&self, tenant: &str) -> Vec<&CatalogJob> {
        self.tenant(tenant).map(|t| t.jobs.values().collect()).unwrap_or_default()
    }

    pub fn job(&self, tenant: &str, name: &str) -> Option<&CatalogJob> {
        self.tenant(tenant).and_then(|t| t.jobs.get(name))
    }

    /// All tenant names that have at least one catalog entry (table, view, function, or
    /// job). Used by the scheduler to enumerate jobs across tenants.
    pub fn tenant_names(&self) -> Vec<String> {
        self.tenants.keys().cloned().collect()
    }

    pub fn set_job_next_run(&mut self, tenant: &str, name: &str, next_run_at: Option<i64>) {
        if let Some(job) = self.tenant_mut(tenant).jobs.get_mut(name) {
            job.next_run_at = next_run_at;
        }
    }

    pub fn set_job_enabled(&mut self, tenant: &str, name: &str, enabled: bool) {
        if let Some(job) = self.tenant_mut(tenant).jobs.get_mut(name) {
            job.enabled = enabled;
        }
    }

    pub fn set_job_run_result(
        &mut self,
        tenant: &str,
        name: &str,
        last_run_at: i64,
        next_run_at: Option<i64>,
        last_error: Option<String>,
    ) {
        if let Some(job) = self.tenant_mut(tenant).jobs.get_mut(name) {
            job.last_run_at = Some(last_run_at);
            job.next_run_at = next_run_at;
            job.last_error = last_error;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDef, DataType};

    fn schema(name: &str) -> Schema {
        Schema {
            name: name.to_string(),
            columns: vec![ColumnDef {
                name: "id".into(),
                data_type: DataType::Integer,
                nullable: false,
                default: None,
                primary_key: true,
                auto_increment: true,
                unique: false,
            }],
            auto_increment_counter: 1,
        }
    }

    #[test]
    fn tenants_are_isolated() {
        let mut cat = Catalog::new();
        cat.put_table("acme", schema("users"));
        assert!(cat.table("acme", "users").is_some());
        assert!(cat.table("other", "users").is_none());
    }

    #[test]
    fn drop_table_removes_it() {
        let mut cat = Catalog::new();
        cat.put_table("acme", schema("users"));
        cat.drop_table("acme", "users");
        assert!(cat.table("acme", "users").is_none());
    }

    #[test]
    fn job_bookkeeping_updates_in_place() {
        let mut cat = Catalog::new();
        cat.put_job(
            "acme",
            CatalogJob {
                name: "nightly".into(),
                sql: "DELETE FROM logs".into(),
                schedule: JobSchedule::Interval { ms: 60_000, catch_up: false },
                enabled: true,
                no_overlap: true,
                max_runtime_ms: Some(5_000),
                last_run_at: None,
                next_run_at: None,
                last_error: None,
            },
        );
        cat.set_job_run_result("acme", "nightly", 1000, Some(61_000), Some("boom".into()));
        let job = cat.job("acme", "nightly").unwrap();
        assert_eq!(job.last_run_at, Some(1000));
        assert_eq!(job.next_run_at, Some(61_000));
        assert_eq!(job.last_error.as_deref(), Some("boom"));
    }
}
