//! Diesel schema for execution persistence.

diesel::table! {
    /// Definition rows, locked to serialise single-flight checks.
    task_definitions (id) {
        /// Definition identifier.
        id -> Uuid,
    }
}

diesel::table! {
    /// Run attempts of task definitions.
    task_executions (id) {
        /// Execution identifier.
        id -> Uuid,
        /// Owning definition.
        definition_id -> Uuid,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Trigger type.
        #[max_length = 20]
        trigger_type -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Worker start timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Terminal status timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Failure reason for failed executions.
        failure_reason -> Nullable<Text>,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only execution log entries.
    task_logs (id) {
        /// Entry identifier.
        id -> Uuid,
        /// Owning execution.
        execution_id -> Uuid,
        /// Arrival sequence (`BIGSERIAL`).
        seq -> Int8,
        /// Severity.
        #[max_length = 20]
        level -> Varchar,
        /// Message text.
        message -> Text,
        /// Optional structured payload.
        context -> Nullable<Jsonb>,
        /// Reported or ingestion-time timestamp.
        logged_at -> Timestamptz,
        /// Writer of the entry.
        #[max_length = 20]
        source -> Varchar,
        /// Whether the entry arrived after cancellation.
        post_cancellation -> Bool,
    }
}

diesel::joinable!(task_executions -> task_definitions (definition_id));
diesel::joinable!(task_logs -> task_executions (execution_id));
diesel::allow_tables_to_appear_in_same_query!(task_definitions, task_executions, task_logs);
