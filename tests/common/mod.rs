//! Seeded synthetic corpus of benign syslog traffic.

#![allow(dead_code)]

use log_sentinel::config::TrainingConfig;
use log_sentinel::features::HashingEmbedder;
use log_sentinel::training::{Trainer, TrainingOutcome};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub const HOSTNAMES: &[&str] = &["corp-server-01", "web-prod-03", "db-main-01", "api-gateway-1"];
pub const PROCESSES: &[&str] = &["sshd", "cron", "kernel", "systemd", "apache2", "mysql"];
pub const USERS: &[&str] = &["root", "admin", "ubuntu", "guest", "testuser"];
pub const MONTHS: &[&str] = &["Sep", "Oct"];

pub const INJECTION: &str = "Sep 02 21:42:00 db-main-01 mysql[1111]: SQL injection attempt: ' or 1=1; --";

pub fn benign_line(rng: &mut StdRng) -> String {
    let user = *USERS.choose(rng).unwrap();
    let pid: u32 = rng.gen_range(1000..10000);
    let message = match rng.gen_range(0..7) {
        0 => format!(
            "Accepted password for {} from 10.0.{}.{} port {}",
            user,
            rng.gen_range(1..255),
            rng.gen_range(1..255),
            rng.gen_range(1024..65536)
        ),
        1 => format!("session opened for user {} by (uid=0)", user),
        2 => format!(
            "CRON[{}]: (root) CMD (command -v debian-sa1 > /dev/null && debian-sa1 1 1)",
            pid
        ),
        3 => "kernel: a new usb device found, idVendor=1d6b, idProduct=0002".to_string(),
        4 => format!(
            "systemd: Started Session {} of user {}.",
            rng.gen_range(1..101),
            user
        ),
        5 => "apache2: AH00558: apache2: Could not reliably determine the server's fully qualified domain name".to_string(),
        _ => "mysql: [Note] Server socket created on IP: '127.0.0.1'.".to_string(),
    };
    format!(
        "{} {:02} {:02}:{:02}:{:02} {} {}[{}]: {}",
        MONTHS.choose(rng).unwrap(),
        rng.gen_range(1..29),
        rng.gen_range(0..24),
        rng.gen_range(0..60),
        rng.gen_range(0..60),
        HOSTNAMES.choose(rng).unwrap(),
        PROCESSES.choose(rng).unwrap(),
        pid,
        message
    )
}

pub fn corpus(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| benign_line(&mut rng)).collect()
}

pub fn training_config() -> TrainingConfig {
    TrainingConfig {
        n_estimators: 100,
        contamination: 0.01,
        max_samples: 256,
        seed: 42,
        ..TrainingConfig::default()
    }
}

pub fn embedder() -> Arc<HashingEmbedder> {
    Arc::new(HashingEmbedder::new(64, 3).unwrap())
}

pub fn train(lines: &[String]) -> TrainingOutcome {
    Trainer::new(training_config(), embedder())
        .fit_lines(lines.iter().map(String::as_str))
        .unwrap()
}
