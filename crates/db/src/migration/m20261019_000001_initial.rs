//! Initial database migration.
//!
//! Creates the enums and tables behind expenses, approval rules, approval
//! workflows, approval tasks and the audit log.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: COMPANIES & USERS
        // ============================================================
        db.execute_unprepared(COMPANIES_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 3: EXPENSES
        // ============================================================
        db.execute_unprepared(EXPENSES_SQL).await?;

        // ============================================================
        // PART 4: APPROVAL RULES
        // ============================================================
        db.execute_unprepared(APPROVAL_RULES_SQL).await?;

        // ============================================================
        // PART 5: WORKFLOWS & APPROVALS
        // ============================================================
        db.execute_unprepared(APPROVAL_WORKFLOWS_SQL).await?;
        db.execute_unprepared(APPROVALS_SQL).await?;

        // ============================================================
        // PART 6: AUDIT LOG
        // ============================================================
        db.execute_unprepared(AUDIT_LOGS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE user_role AS ENUM ('admin', 'manager', 'employee');

CREATE TYPE expense_status AS ENUM (
    'draft',
    'submitted',
    'pending_approval',
    'approved',
    'rejected',
    'paid'
);

CREATE TYPE approval_rule_type AS ENUM (
    'sequential',
    'parallel',
    'percentage',
    'specific_approver',
    'hybrid'
);

CREATE TYPE approval_status AS ENUM ('pending', 'approved', 'rejected');

CREATE TYPE audit_action AS ENUM ('SUBMIT', 'APPROVE', 'REJECT');
";

const COMPANIES_SQL: &str = r"
CREATE TABLE companies (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    default_currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    email VARCHAR(255) NOT NULL UNIQUE,
    full_name VARCHAR(255) NOT NULL,
    role user_role NOT NULL DEFAULT 'employee',
    reporting_manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_not_own_manager CHECK (reporting_manager_id IS DISTINCT FROM id)
);

CREATE INDEX idx_users_company ON users(company_id);
";

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    submitter_id UUID NOT NULL REFERENCES users(id),
    amount NUMERIC(19, 4) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    description TEXT NOT NULL,
    status expense_status NOT NULL DEFAULT 'draft',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_positive CHECK (amount > 0)
);

CREATE INDEX idx_expenses_company ON expenses(company_id, created_at DESC);
CREATE INDEX idx_expenses_submitter ON expenses(submitter_id, created_at DESC);
";

const APPROVAL_RULES_SQL: &str = r"
CREATE TABLE approval_rules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    rule_type approval_rule_type NOT NULL,
    minimum_approval_percentage NUMERIC(5, 2) NOT NULL DEFAULT 100,
    requires_manager_approval BOOLEAN NOT NULL DEFAULT true,
    approver_sequence_matters BOOLEAN NOT NULL DEFAULT false,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_rule_name CHECK (length(trim(name)) > 0),
    CONSTRAINT chk_rule_percentage CHECK (minimum_approval_percentage BETWEEN 0 AND 100)
);

-- Rule selection walks active rules oldest first
CREATE INDEX idx_approval_rules_company ON approval_rules(company_id, created_at)
    WHERE is_active = true;

CREATE TABLE approval_rule_approvers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    rule_id UUID NOT NULL REFERENCES approval_rules(id) ON DELETE CASCADE,
    approver_id UUID NOT NULL REFERENCES users(id),
    sequence_order INTEGER NOT NULL,
    is_required BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_sequence_order CHECK (sequence_order >= 1)
);

CREATE INDEX idx_rule_approvers_rule ON approval_rule_approvers(rule_id, sequence_order);
";

const APPROVAL_WORKFLOWS_SQL: &str = r"
CREATE TABLE approval_workflows (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    rule_id UUID NOT NULL REFERENCES approval_rules(id),
    rule_type approval_rule_type NOT NULL,
    minimum_approval_percentage NUMERIC(5, 2) NOT NULL,
    status approval_status NOT NULL DEFAULT 'pending',
    current_step INTEGER NOT NULL DEFAULT 1,
    total_steps INTEGER NOT NULL,
    completed_steps INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_total_steps CHECK (total_steps >= 1),
    CONSTRAINT chk_completed_steps CHECK (completed_steps BETWEEN 0 AND total_steps),
    CONSTRAINT chk_current_step CHECK (current_step BETWEEN 1 AND total_steps)
);

-- At most one pending workflow per expense
CREATE UNIQUE INDEX uq_workflows_active_expense ON approval_workflows(expense_id)
    WHERE status = 'pending';

CREATE INDEX idx_workflows_expense ON approval_workflows(expense_id, created_at DESC);
";

const APPROVALS_SQL: &str = r"
CREATE TABLE approvals (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    workflow_id UUID NOT NULL REFERENCES approval_workflows(id) ON DELETE CASCADE,
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    approver_id UUID NOT NULL REFERENCES users(id),
    step INTEGER NOT NULL,
    status approval_status NOT NULL DEFAULT 'pending',
    comments TEXT,
    approved_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_approvals_workflow_approver UNIQUE (workflow_id, approver_id),
    CONSTRAINT chk_step CHECK (step >= 1),
    CONSTRAINT chk_decided_at CHECK ((status = 'pending') = (approved_at IS NULL))
);

-- Pending approvals of a user (most common query)
CREATE INDEX idx_approvals_pending_approver ON approvals(approver_id, created_at)
    WHERE status = 'pending';

CREATE INDEX idx_approvals_workflow ON approvals(workflow_id, step);
";

const AUDIT_LOGS_SQL: &str = r"
CREATE TABLE audit_logs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL REFERENCES users(id),
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    action audit_action NOT NULL,
    description TEXT NOT NULL,
    old_values JSONB,
    new_values JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_logs_expense ON audit_logs(expense_id, created_at);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS audit_logs CASCADE;
DROP TABLE IF EXISTS approvals CASCADE;
DROP TABLE IF EXISTS approval_workflows CASCADE;
DROP TABLE IF EXISTS approval_rule_approvers CASCADE;
DROP TABLE IF EXISTS approval_rules CASCADE;
DROP TABLE IF EXISTS expenses CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TABLE IF EXISTS companies CASCADE;

DROP TYPE IF EXISTS audit_action;
DROP TYPE IF EXISTS approval_status;
DROP TYPE IF EXISTS approval_rule_type;
DROP TYPE IF EXISTS expense_status;
DROP TYPE IF EXISTS user_role;
";
