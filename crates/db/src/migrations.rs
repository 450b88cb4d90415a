//! Inline schema migrations, tracked via a `_migrations` table: each entry
//! in [`MIGRATIONS`] is a migration, `Database::run_migrations` applies
//! only the ones past the highest recorded version.

/// Schema for every entity in §3, in dependency order. Each string is one
/// migration; once applied its index is recorded in `_migrations` and it
/// is never re-run.
pub static MIGRATIONS: &[&str] = &[
    // 1: users
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        login_handle TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    // 2: problems (global catalog)
    r#"
    CREATE TABLE IF NOT EXISTS problems (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        source TEXT,
        url TEXT,
        difficulty TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    // 3: problems dedup index (case-insensitive title+source)
    "CREATE INDEX IF NOT EXISTS idx_problems_title_source ON problems(title COLLATE NOCASE, source COLLATE NOCASE)",
    // 4: patterns (global catalog)
    r#"
    CREATE TABLE IF NOT EXISTS patterns (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    // 5: unique case-insensitive pattern titles (§3 "uniqueness enforced case-insensitively")
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_patterns_title_ci ON patterns(title COLLATE NOCASE)",
    // 6: problem_patterns association
    r#"
    CREATE TABLE IF NOT EXISTS problem_patterns (
        problem_id TEXT NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
        pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
        PRIMARY KEY (problem_id, pattern_id)
    )
    "#,
    // 7: attempts
    r#"
    CREATE TABLE IF NOT EXISTS attempts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        problem_id TEXT NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
        session_id TEXT REFERENCES revision_sessions(id) ON DELETE SET NULL,
        state TEXT NOT NULL,
        elapsed_seconds INTEGER NOT NULL DEFAULT 0,
        timer_state TEXT NOT NULL DEFAULT 'idle',
        last_timer_update TEXT,
        confidence INTEGER,
        outcome TEXT,
        duration_seconds INTEGER,
        notes TEXT,
        performed_at TEXT,
        started_at TEXT NOT NULL
    )
    "#,
    // 8: at most one in_progress attempt per (user, problem)
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_attempts_one_in_progress
    ON attempts(user_id, problem_id)
    WHERE state = 'in_progress'
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attempts_user_problem ON attempts(user_id, problem_id, performed_at)",
    // 10: user_problem_stats
    r#"
    CREATE TABLE IF NOT EXISTS user_problem_stats (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        problem_id TEXT NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'unsolved',
        confidence INTEGER NOT NULL DEFAULT 50,
        avg_confidence REAL NOT NULL DEFAULT 50.0,
        last_attempt_at TEXT,
        total_attempts INTEGER NOT NULL DEFAULT 0,
        avg_time_seconds REAL,
        last_outcome TEXT,
        recent_history_json TEXT NOT NULL DEFAULT '[]',
        next_review_at TEXT NOT NULL,
        interval_days REAL NOT NULL DEFAULT 1.0,
        ease_factor REAL NOT NULL DEFAULT 2.5,
        review_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, problem_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_problem_stats_due ON user_problem_stats(user_id, next_review_at)",
    // 12: user_pattern_stats
    r#"
    CREATE TABLE IF NOT EXISTS user_pattern_stats (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
        times_revised INTEGER NOT NULL DEFAULT 0,
        avg_confidence REAL NOT NULL DEFAULT 0.0,
        last_revised_at TEXT,
        PRIMARY KEY (user_id, pattern_id)
    )
    "#,
    // 13: revision_sessions
    r#"
    CREATE TABLE IF NOT EXISTS revision_sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        template_key TEXT,
        planned_duration_min INTEGER NOT NULL,
        problem_ids_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        completed_at TEXT,
        elapsed_seconds INTEGER NOT NULL DEFAULT 0,
        timer_state TEXT NOT NULL DEFAULT 'idle'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_revision_sessions_user ON revision_sessions(user_id, created_at)",
    // 15: refresh_tokens (opaque secret stored only by hash, §6)
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        revoked_at TEXT
    )
    "#,
    // 16: password_reset_tokens
    r#"
    CREATE TABLE IF NOT EXISTS password_reset_tokens (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        used_at TEXT
    )
    "#,
    // 17: invite_codes
    r#"
    CREATE TABLE IF NOT EXISTS invite_codes (
        id TEXT PRIMARY KEY,
        code_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        redeemed_by TEXT REFERENCES users(id) ON DELETE SET NULL,
        redeemed_at TEXT
    )
    "#,
    // 18: settings (§4.8)
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];
