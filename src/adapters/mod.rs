//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter   | Implements                  | Connects to               |
//! |-----------|-----------------------------|---------------------------|
//! | `device`  | all ports (bundle)          | the adapters below        |
//! | `nvs`     | (config loading)            | NVS provisioning blob     |
//! | `ota`     | UpdaterPort                 | HTTP client + `esp-ota`   |
//! | `remote`  | RemoteChannel               | MQTT broker               |
//! | `system`  | PowerPort                   | deep sleep, restart       |
//! | `time`    | Clock, DelayNs, WallClock   | ESP timer, FreeRTOS, SNTP |
//! | `wifi`    | SessionPort (link half)     | ESP-IDF WiFi STA          |

pub mod device;
pub mod nvs;
pub mod ota;
pub mod remote;
pub mod system;
pub mod time;
pub mod wifi;
