//! Diesel schema for task definition persistence.

diesel::table! {
    /// Scrape target definitions owned by the CRUD layer.
    task_definitions (id) {
        /// Definition identifier.
        id -> Uuid,
        /// Human-readable name.
        #[max_length = 255]
        name -> Varchar,
        /// Target site in canonical string form.
        #[max_length = 50]
        target_site -> Varchar,
        /// Whether the definition may be enqueued.
        is_enabled -> Bool,
        /// Optional schedule interval in seconds.
        schedule_interval_secs -> Nullable<Int8>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
