use metrics::counter;

pub fn record_request(endpoint: &'static str, outcome: &'static str) {
    counter!("api_requests_total", "endpoint" => endpoint, "outcome" => outcome).increment(1);
}

pub fn record_auth_expired(endpoint: &'static str) {
    counter!("auth_expired_total", "endpoint" => endpoint).increment(1);
}

pub fn record_login(outcome: &'static str) {
    counter!("logins_total", "outcome" => outcome).increment(1);
}

pub fn record_probe(healthy: bool) {
    let outcome = if healthy { "ok" } else { "fail" };
    counter!("health_probes_total", "outcome" => outcome).increment(1);
}
