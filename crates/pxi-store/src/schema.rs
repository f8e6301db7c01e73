/// Idempotent schema bootstrap, executed at startup. Uniqueness follows
/// the persisted-state contract: samples on (indicator_id,
/// source_timestamp), composites on calculated_at, regimes and daily
/// history on their dates.
pub(crate) const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS raw_samples (
        indicator_id      TEXT NOT NULL,
        value             DOUBLE PRECISION NOT NULL,
        unit              TEXT NOT NULL,
        source_timestamp  TIMESTAMPTZ NOT NULL,
        ingested_at       TIMESTAMPTZ NOT NULL,
        signal_multiplier DOUBLE PRECISION,
        PRIMARY KEY (indicator_id, source_timestamp)
    )",
    "CREATE TABLE IF NOT EXISTS indicator_stats (
        indicator_id TEXT NOT NULL,
        window_days  BIGINT NOT NULL,
        mean         DOUBLE PRECISION NOT NULL,
        std_dev      DOUBLE PRECISION,
        n            BIGINT NOT NULL,
        min          DOUBLE PRECISION NOT NULL,
        max          DOUBLE PRECISION NOT NULL,
        as_of        TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (indicator_id, window_days)
    )",
    "CREATE TABLE IF NOT EXISTS z_scores (
        indicator_id TEXT NOT NULL,
        timestamp    TIMESTAMPTZ NOT NULL,
        raw_value    DOUBLE PRECISION NOT NULL,
        mean         DOUBLE PRECISION NOT NULL,
        std_dev      DOUBLE PRECISION NOT NULL,
        z            DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (indicator_id, timestamp)
    )",
    "CREATE TABLE IF NOT EXISTS contributions (
        calculated_at     TIMESTAMPTZ NOT NULL,
        indicator_id      TEXT NOT NULL,
        value             DOUBLE PRECISION NOT NULL,
        z                 DOUBLE PRECISION NOT NULL,
        normalized_weight DOUBLE PRECISION NOT NULL,
        contribution      DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (calculated_at, indicator_id)
    )",
    "CREATE TABLE IF NOT EXISTS composites (
        calculated_at TIMESTAMPTZ PRIMARY KEY,
        raw_pxi       DOUBLE PRECISION NOT NULL,
        pxi           DOUBLE PRECISION NOT NULL,
        regime        TEXT NOT NULL,
        total_weight  DOUBLE PRECISION NOT NULL,
        pamp_count    BIGINT NOT NULL,
        stress_count  BIGINT NOT NULL,
        metrics       JSONB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS alerts (
        id           BIGSERIAL PRIMARY KEY,
        alert_type   TEXT NOT NULL,
        indicator_id TEXT,
        timestamp    TIMESTAMPTZ NOT NULL,
        raw_value    DOUBLE PRECISION,
        z            DOUBLE PRECISION,
        threshold    DOUBLE PRECISION,
        message      TEXT NOT NULL,
        severity     TEXT NOT NULL,
        acknowledged BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_type_time ON alerts (alert_type, timestamp)",
    "CREATE TABLE IF NOT EXISTS history_daily (
        indicator_id TEXT NOT NULL,
        date         DATE NOT NULL,
        value        DOUBLE PRECISION NOT NULL,
        source       TEXT NOT NULL,
        PRIMARY KEY (indicator_id, date)
    )",
    "CREATE TABLE IF NOT EXISTS regimes (
        date          DATE PRIMARY KEY,
        regime        TEXT NOT NULL,
        cluster_id    BIGINT NOT NULL,
        features      JSONB NOT NULL,
        centroid      JSONB NOT NULL,
        probabilities JSONB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS technical_signals (
        indicator_id      TEXT PRIMARY KEY,
        rsi               DOUBLE PRECISION,
        macd              DOUBLE PRECISION,
        macd_signal       DOUBLE PRECISION,
        macd_histogram    DOUBLE PRECISION,
        signal_multiplier DOUBLE PRECISION NOT NULL,
        refreshed_at      TIMESTAMPTZ NOT NULL
    )",
];
