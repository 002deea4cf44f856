use shared::metrics_defs::{MetricDef, MetricType};

pub const LOGINS_FAILED: MetricDef = MetricDef {
    name: "auth.logins_failed",
    metric_type: MetricType::Counter,
    description: "Login attempts rejected for bad credentials",
};

pub const TOKENS_REJECTED: MetricDef = MetricDef {
    name: "auth.tokens_rejected",
    metric_type: MetricType::Counter,
    description: "Requests rejected for an invalid, expired or missing token",
};

pub const RATE_LIMITED: MetricDef = MetricDef {
    name: "rate_limit.rejections",
    metric_type: MetricType::Counter,
    description: "Requests rejected by the credential-endpoint rate limiter",
};

pub const SHARE_CACHE_HIT: MetricDef = MetricDef {
    name: "share.negative_cache_hit",
    metric_type: MetricType::Counter,
    description: "Public share lookups answered from the negative cache",
};

pub const SHARE_CACHE_MISS: MetricDef = MetricDef {
    name: "share.negative_cache_miss",
    metric_type: MetricType::Counter,
    description: "Public share lookups that went to the database",
};

pub const THUMBNAILS_EVICTED: MetricDef = MetricDef {
    name: "thumbnails.evicted",
    metric_type: MetricType::Counter,
    description: "Thumbnail entries evicted to stay within the byte budget",
};

pub const ALL_METRICS: &[MetricDef] = &[
    LOGINS_FAILED,
    TOKENS_REJECTED,
    RATE_LIMITED,
    SHARE_CACHE_HIT,
    SHARE_CACHE_MISS,
    THUMBNAILS_EVICTED,
];
