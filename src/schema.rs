//! The canonical payroll / job-portal schema.
//!
//! Every table the tooling knows about is declared once here. Drift detection
//! compares the live database against this catalog and repair renders its DDL
//! from it, so there is exactly one place where a column is defined.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::errors::AppError;

pub const DEFAULT_ENGINE: &str = "InnoDB";
pub const DEFAULT_CHARSET: &str = "utf8mb4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
    /// Raw SQL default expression, e.g. `'active'` or `CURRENT_TIMESTAMP`.
    pub default: Option<&'static str>,
    pub extra: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDef {
    pub name: &'static str,
    pub column: &'static str,
    pub ref_table: &'static str,
    pub ref_column: &'static str,
    pub on_delete: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDef {
    pub name: &'static str,
    pub engine: &'static str,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<&'static str>,
    pub indexes: Vec<IndexDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    /// Older names the same concept has been created under.
    pub legacy_aliases: Vec<&'static str>,
}

impl ColumnDef {
    pub fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: true,
            default: None,
            extra: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub fn extra(mut self, extra: &'static str) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(self.name), self.sql_type);
        sql.push_str(if self.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if let Some(extra) = self.extra {
            sql.push(' ');
            sql.push_str(extra);
        }
        sql
    }
}

impl IndexDef {
    pub fn new(name: &'static str, columns: &[&'static str]) -> Self {
        Self {
            name,
            columns: columns.to_vec(),
            unique: false,
        }
    }

    pub fn unique(name: &'static str, columns: &[&'static str]) -> Self {
        Self {
            unique: true,
            ..Self::new(name, columns)
        }
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Clause used inside `CREATE TABLE`.
    pub fn inline_sql(&self) -> String {
        let kind = if self.unique { "UNIQUE KEY" } else { "KEY" };
        format!("{} {} ({})", kind, quote_ident(self.name), self.column_list())
    }

    pub fn add_sql(&self, table: &str) -> String {
        let kind = if self.unique { "UNIQUE INDEX" } else { "INDEX" };
        format!(
            "ALTER TABLE {} ADD {} {} ({})",
            quote_ident(table),
            kind,
            quote_ident(self.name),
            self.column_list()
        )
    }
}

impl ForeignKeyDef {
    pub fn new(
        name: &'static str,
        column: &'static str,
        ref_table: &'static str,
        on_delete: &'static str,
    ) -> Self {
        Self {
            name,
            column,
            ref_table,
            ref_column: "id",
            on_delete,
        }
    }

    pub fn inline_sql(&self) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            quote_ident(self.name),
            quote_ident(self.column),
            quote_ident(self.ref_table),
            quote_ident(self.ref_column),
            self.on_delete
        )
    }

    pub fn add_sql(&self, table: &str) -> String {
        format!("ALTER TABLE {} ADD {}", quote_ident(table), self.inline_sql())
    }
}

impl TableDef {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            engine: DEFAULT_ENGINE,
            columns: vec![id_column()],
            primary_key: vec!["id"],
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            legacy_aliases: Vec::new(),
        }
    }

    fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    fn timestamps(self) -> Self {
        self.column(created_at_column()).column(updated_at_column())
    }

    fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    fn foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    fn alias(mut self, alias: &'static str) -> Self {
        self.legacy_aliases.push(alias);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Tables this one references, excluding itself.
    pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.foreign_keys
            .iter()
            .map(|fk| fk.ref_table)
            .filter(move |t| *t != self.name)
    }

    pub fn create_sql(&self) -> String {
        let mut clauses: Vec<String> = self.columns.iter().map(|c| c.definition_sql()).collect();

        if !self.primary_key.is_empty() {
            let pk = self
                .primary_key
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("PRIMARY KEY ({})", pk));
        }
        clauses.extend(self.indexes.iter().map(|i| i.inline_sql()));
        clauses.extend(self.foreign_keys.iter().map(|fk| fk.inline_sql()));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n) ENGINE={} DEFAULT CHARSET={}",
            quote_ident(self.name),
            clauses.join(",\n  "),
            self.engine,
            DEFAULT_CHARSET
        )
    }
}

fn id_column() -> ColumnDef {
    ColumnDef::new("id", "int unsigned")
        .not_null()
        .extra("AUTO_INCREMENT")
}

fn fk_column(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, "int unsigned").not_null()
}

fn created_at_column() -> ColumnDef {
    ColumnDef::new("created_at", "timestamp")
        .not_null()
        .default_value("CURRENT_TIMESTAMP")
}

fn updated_at_column() -> ColumnDef {
    ColumnDef::new("updated_at", "timestamp")
        .not_null()
        .default_value("CURRENT_TIMESTAMP")
        .extra("ON UPDATE CURRENT_TIMESTAMP")
}

/// The full catalog, in a valid creation order.
pub fn catalog() -> Vec<TableDef> {
    vec![
        TableDef::new("users")
            .column(ColumnDef::new("name", "varchar(150)").not_null())
            .column(ColumnDef::new("email", "varchar(191)").not_null())
            .column(ColumnDef::new("password_hash", "varchar(255)").not_null())
            .column(
                ColumnDef::new(
                    "role",
                    "enum('admin','employer','employee','vendor','job_seeker')",
                )
                .not_null()
                .default_value("'job_seeker'"),
            )
            .column(ColumnDef::new("phone", "varchar(30)"))
            .column(
                ColumnDef::new("is_active", "tinyint(1)")
                    .not_null()
                    .default_value("1"),
            )
            .timestamps()
            .index(IndexDef::unique("uq_users_email", &["email"]))
            .index(IndexDef::new("idx_users_role", &["role"])),
        TableDef::new("employers")
            .column(fk_column("user_id"))
            .column(ColumnDef::new("company_name", "varchar(200)").not_null())
            .column(ColumnDef::new("registration_number", "varchar(100)"))
            .column(ColumnDef::new("industry", "varchar(100)"))
            .column(ColumnDef::new("address", "text"))
            .column(ColumnDef::new("phone", "varchar(30)"))
            .column(ColumnDef::new("email", "varchar(191)"))
            .column(ColumnDef::new("website", "varchar(255)"))
            .timestamps()
            .foreign_key(ForeignKeyDef::new(
                "fk_employers_user",
                "user_id",
                "users",
                "CASCADE",
            ))
            .alias("companies"),
        TableDef::new("employees")
            .column(ColumnDef::new("user_id", "int unsigned"))
            .column(fk_column("employer_id"))
            .column(ColumnDef::new("employee_code", "varchar(50)").not_null())
            .column(ColumnDef::new("first_name", "varchar(100)").not_null())
            .column(ColumnDef::new("last_name", "varchar(100)").not_null())
            .column(ColumnDef::new("email", "varchar(191)"))
            .column(ColumnDef::new("department", "varchar(100)"))
            .column(ColumnDef::new("designation", "varchar(100)"))
            .column(
                ColumnDef::new("salary", "decimal(12,2)")
                    .not_null()
                    .default_value("0.00"),
            )
            .column(ColumnDef::new("hire_date", "date"))
            .column(
                ColumnDef::new("status", "enum('active','inactive','terminated')")
                    .not_null()
                    .default_value("'active'"),
            )
            .timestamps()
            .index(IndexDef::unique(
                "uq_employees_employer_code",
                &["employer_id", "employee_code"],
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_employees_user",
                "user_id",
                "users",
                "SET NULL",
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_employees_employer",
                "employer_id",
                "employers",
                "CASCADE",
            )),
        TableDef::new("vendors")
            .column(fk_column("user_id"))
            .column(ColumnDef::new("vendor_name", "varchar(200)").not_null())
            .column(ColumnDef::new("service_type", "varchar(100)"))
            .column(ColumnDef::new("contact_email", "varchar(191)"))
            .column(ColumnDef::new("contact_phone", "varchar(30)"))
            .column(ColumnDef::new("address", "text"))
            .column(
                ColumnDef::new("status", "enum('pending','approved','rejected')")
                    .not_null()
                    .default_value("'pending'"),
            )
            .timestamps()
            .foreign_key(ForeignKeyDef::new(
                "fk_vendors_user",
                "user_id",
                "users",
                "CASCADE",
            )),
        TableDef::new("job_seekers")
            .column(fk_column("user_id"))
            .column(ColumnDef::new("first_name", "varchar(100)").not_null())
            .column(ColumnDef::new("last_name", "varchar(100)").not_null())
            .column(ColumnDef::new("phone", "varchar(30)"))
            .column(ColumnDef::new("date_of_birth", "date"))
            .timestamps()
            .index(IndexDef::unique("uq_job_seekers_user", &["user_id"]))
            .foreign_key(ForeignKeyDef::new(
                "fk_job_seekers_user",
                "user_id",
                "users",
                "CASCADE",
            )),
        TableDef::new("job_seeker_profiles")
            .column(fk_column("job_seeker_id"))
            .column(ColumnDef::new("headline", "varchar(255)"))
            .column(ColumnDef::new("summary", "text"))
            .column(ColumnDef::new("location", "varchar(150)"))
            .column(ColumnDef::new("resume_url", "varchar(500)"))
            .column(ColumnDef::new("expected_salary", "decimal(12,2)"))
            .timestamps()
            .index(IndexDef::unique(
                "uq_job_seeker_profiles_seeker",
                &["job_seeker_id"],
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_job_seeker_profiles_seeker",
                "job_seeker_id",
                "job_seekers",
                "CASCADE",
            )),
        TableDef::new("job_seeker_skills")
            .column(fk_column("job_seeker_id"))
            .column(ColumnDef::new("skill_name", "varchar(100)").not_null())
            .column(
                ColumnDef::new(
                    "proficiency",
                    "enum('beginner','intermediate','advanced','expert')",
                )
                .not_null()
                .default_value("'intermediate'"),
            )
            .column(ColumnDef::new("years_experience", "tinyint unsigned"))
            .column(created_at_column())
            .index(IndexDef::unique(
                "uq_job_seeker_skills_name",
                &["job_seeker_id", "skill_name"],
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_job_seeker_skills_seeker",
                "job_seeker_id",
                "job_seekers",
                "CASCADE",
            )),
        TableDef::new("job_seeker_experience")
            .column(fk_column("job_seeker_id"))
            .column(ColumnDef::new("company_name", "varchar(200)").not_null())
            .column(ColumnDef::new("job_title", "varchar(150)").not_null())
            .column(ColumnDef::new("start_date", "date").not_null())
            .column(ColumnDef::new("end_date", "date"))
            .column(
                ColumnDef::new("is_current", "tinyint(1)")
                    .not_null()
                    .default_value("0"),
            )
            .column(ColumnDef::new("description", "text"))
            .column(created_at_column())
            .foreign_key(ForeignKeyDef::new(
                "fk_job_seeker_experience_seeker",
                "job_seeker_id",
                "job_seekers",
                "CASCADE",
            )),
        TableDef::new("job_seeker_education")
            .column(fk_column("job_seeker_id"))
            .column(ColumnDef::new("institution", "varchar(200)").not_null())
            .column(ColumnDef::new("degree", "varchar(150)").not_null())
            .column(ColumnDef::new("field_of_study", "varchar(150)"))
            .column(ColumnDef::new("start_date", "date"))
            .column(ColumnDef::new("end_date", "date"))
            .column(ColumnDef::new("grade", "varchar(50)"))
            .column(created_at_column())
            .foreign_key(ForeignKeyDef::new(
                "fk_job_seeker_education_seeker",
                "job_seeker_id",
                "job_seekers",
                "CASCADE",
            )),
        TableDef::new("jobs")
            .column(fk_column("employer_id"))
            .column(ColumnDef::new("title", "varchar(200)").not_null())
            .column(ColumnDef::new("description", "text").not_null())
            .column(ColumnDef::new("location", "varchar(150)"))
            .column(
                ColumnDef::new(
                    "employment_type",
                    "enum('full_time','part_time','contract','internship')",
                )
                .not_null()
                .default_value("'full_time'"),
            )
            .column(ColumnDef::new("salary_min", "decimal(12,2)"))
            .column(ColumnDef::new("salary_max", "decimal(12,2)"))
            .column(
                ColumnDef::new("status", "enum('draft','open','closed')")
                    .not_null()
                    .default_value("'open'"),
            )
            .column(ColumnDef::new("posted_at", "timestamp"))
            .timestamps()
            .index(IndexDef::new("idx_jobs_status", &["status"]))
            .foreign_key(ForeignKeyDef::new(
                "fk_jobs_employer",
                "employer_id",
                "employers",
                "CASCADE",
            )),
        TableDef::new("job_applications")
            .column(fk_column("job_id"))
            .column(fk_column("job_seeker_id"))
            .column(ColumnDef::new("cover_letter", "text"))
            .column(
                ColumnDef::new(
                    "status",
                    "enum('applied','reviewing','shortlisted','rejected','hired')",
                )
                .not_null()
                .default_value("'applied'"),
            )
            .column(
                ColumnDef::new("applied_at", "timestamp")
                    .not_null()
                    .default_value("CURRENT_TIMESTAMP"),
            )
            .column(updated_at_column())
            .index(IndexDef::unique(
                "uq_job_applications_job_seeker",
                &["job_id", "job_seeker_id"],
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_job_applications_job",
                "job_id",
                "jobs",
                "CASCADE",
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_job_applications_seeker",
                "job_seeker_id",
                "job_seekers",
                "CASCADE",
            )),
        TableDef::new("plans")
            .column(ColumnDef::new("name", "varchar(100)").not_null())
            .column(
                ColumnDef::new("price", "decimal(10,2)")
                    .not_null()
                    .default_value("0.00"),
            )
            .column(
                ColumnDef::new("credits", "int unsigned")
                    .not_null()
                    .default_value("0"),
            )
            .column(
                ColumnDef::new("duration_days", "int unsigned")
                    .not_null()
                    .default_value("30"),
            )
            .column(
                ColumnDef::new("is_active", "tinyint(1)")
                    .not_null()
                    .default_value("1"),
            )
            .column(created_at_column())
            .index(IndexDef::unique("uq_plans_name", &["name"])),
        TableDef::new("subscriptions")
            .column(fk_column("user_id"))
            .column(fk_column("plan_id"))
            .column(
                ColumnDef::new("status", "enum('active','expired','cancelled')")
                    .not_null()
                    .default_value("'active'"),
            )
            .column(
                ColumnDef::new("starts_at", "timestamp")
                    .not_null()
                    .default_value("CURRENT_TIMESTAMP"),
            )
            .column(ColumnDef::new("ends_at", "timestamp"))
            .timestamps()
            .index(IndexDef::new("idx_subscriptions_status", &["status"]))
            .foreign_key(ForeignKeyDef::new(
                "fk_subscriptions_user",
                "user_id",
                "users",
                "CASCADE",
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_subscriptions_plan",
                "plan_id",
                "plans",
                "RESTRICT",
            )),
        TableDef::new("credits")
            .column(fk_column("user_id"))
            .column(ColumnDef::new("balance", "int").not_null().default_value("0"))
            .column(updated_at_column())
            .index(IndexDef::unique("uq_credits_user", &["user_id"]))
            .foreign_key(ForeignKeyDef::new(
                "fk_credits_user",
                "user_id",
                "users",
                "CASCADE",
            )),
        TableDef::new("transactions")
            .column(fk_column("user_id"))
            .column(ColumnDef::new("type", "enum('credit','debit')").not_null())
            .column(ColumnDef::new("amount", "decimal(12,2)").not_null())
            .column(ColumnDef::new("credits", "int").not_null().default_value("0"))
            .column(ColumnDef::new("reference", "varchar(100)"))
            .column(ColumnDef::new("description", "varchar(255)"))
            .column(created_at_column())
            .index(IndexDef::new(
                "idx_transactions_user_created",
                &["user_id", "created_at"],
            ))
            .foreign_key(ForeignKeyDef::new(
                "fk_transactions_user",
                "user_id",
                "users",
                "CASCADE",
            )),
        TableDef::new("bill_companies")
            .column(fk_column("employer_id"))
            .column(ColumnDef::new("name", "varchar(200)").not_null())
            .column(ColumnDef::new("tax_id", "varchar(50)"))
            .column(ColumnDef::new("billing_address", "text"))
            .column(ColumnDef::new("billing_email", "varchar(191)"))
            .timestamps()
            .foreign_key(ForeignKeyDef::new(
                "fk_bill_companies_employer",
                "employer_id",
                "employers",
                "CASCADE",
            )),
    ]
}

/// Looks a table up by canonical name or legacy alias.
pub fn table(name: &str) -> Option<TableDef> {
    catalog().into_iter().find(|t| {
        t.name.eq_ignore_ascii_case(name)
            || t.legacy_aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    })
}

/// Orders tables so every referenced table precedes its referrers.
/// Ties keep input order.
pub fn creation_order(tables: &[TableDef]) -> Result<Vec<&TableDef>, AppError> {
    let known: HashSet<&str> = tables.iter().map(|t| t.name).collect();
    for t in tables {
        if let Some(missing) = t.dependencies().find(|d| !known.contains(d)) {
            return Err(AppError::Schema(format!(
                "table `{}` references unknown table `{}`",
                t.name, missing
            )));
        }
    }

    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<&TableDef> = Vec::with_capacity(tables.len());

    while ordered.len() < tables.len() {
        let next = tables
            .iter()
            .find(|t| !placed.contains(t.name) && t.dependencies().all(|d| placed.contains(d)));

        match next {
            Some(t) => {
                placed.insert(t.name);
                ordered.push(t);
            }
            None => {
                let stuck: Vec<&str> = tables
                    .iter()
                    .map(|t| t.name)
                    .filter(|n| !placed.contains(n))
                    .collect();
                return Err(AppError::Schema(format!(
                    "foreign key cycle between: {}",
                    stuck.join(", ")
                )));
            }
        }
    }

    Ok(ordered)
}

pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn width_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(tinyint|smallint|mediumint|bigint|int)\(\s*(\d+)\s*\)")
            .expect("valid width regex")
    })
}

fn alias_regexes() -> &'static [(Regex, &'static str)] {
    static RE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RE.get_or_init(|| {
        vec![
            (Regex::new(r"\s+").expect("valid regex"), " "),
            (Regex::new(r",\s+").expect("valid regex"), ","),
            (Regex::new(r"\binteger\b").expect("valid regex"), "int"),
            (Regex::new(r"\bbool(ean)?\b").expect("valid regex"), "tinyint(1)"),
        ]
    })
}

fn normalize_once(raw: &str) -> String {
    let mut normalized = raw.trim().to_lowercase();
    for (re, replacement) in alias_regexes() {
        normalized = re.replace_all(&normalized, *replacement).into_owned();
    }

    normalized = width_regex()
        .replace_all(&normalized, |caps: &regex::Captures| {
            if &caps[1] == "tinyint" && &caps[2] == "1" {
                caps[0].to_string()
            } else {
                caps[1].to_string()
            }
        })
        .into_owned();

    normalized.trim().to_string()
}

/// Canonical form of a MySQL column type for comparison.
///
/// `INT(11) UNSIGNED` and `int unsigned` compare equal; `tinyint(1)` keeps its
/// width because MySQL uses it to mean boolean.
pub fn normalize_type(raw: &str) -> String {
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_definition_renders_default_and_extra() {
        let sql = updated_at_column().definition_sql();
        assert_eq!(
            sql,
            "`updated_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("odd`name"), "`odd``name`");
    }

    #[test]
    fn alias_lookup_resolves_companies() {
        let t = table("companies").unwrap();
        assert_eq!(t.name, "employers");
        assert!(table("payslips").is_none());
    }
}
