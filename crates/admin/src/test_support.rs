use malblock_common::AppConfig;
use malblock_reputation::ReputationStore;

use crate::state::SharedState;

const TEST_CONFIG: &str = r#"
server:
  listen: ["127.0.0.1:8080"]
upstream:
  servers:
    - addr: "127.0.0.1:3000"
pushgateway:
  address: "http://127.0.0.1:9091"
  username: ops
  password: secret
"#;

pub fn test_state() -> SharedState {
    let config = AppConfig::from_yaml(TEST_CONFIG).unwrap();
    let store = ReputationStore::from_config(&config.blocking, &config.store);
    crate::new_shared_state(config, store).unwrap()
}
