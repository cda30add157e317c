use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Wifi,
    Metered,
    None,
}

impl NetworkKind {
    pub fn parse(value: &str) -> Option<NetworkKind> {
        match value.to_ascii_lowercase().as_str() {
            "wifi" => Some(NetworkKind::Wifi),
            "metered" | "mobile" => Some(NetworkKind::Metered),
            "none" | "offline" => Some(NetworkKind::None),
            _ => None,
        }
    }
}

pub trait NetworkMonitor: Send + Sync {
    fn current(&self) -> NetworkKind;
}

/*
 * A monitor reporting whatever it was told. Headless front ends have no way to tell
 * Wi-Fi from a metered link, so the user states it.
 */
#[derive(Debug)]
pub struct StaticNetworkMonitor {
    kind: Mutex<NetworkKind>,
}

impl StaticNetworkMonitor {
    pub fn new(kind: NetworkKind) -> Self {
        StaticNetworkMonitor {
            kind: Mutex::new(kind),
        }
    }

    pub fn set(&self, kind: NetworkKind) {
        *self.kind.lock().unwrap_or_else(|p| p.into_inner()) = kind;
    }
}

impl NetworkMonitor for StaticNetworkMonitor {
    fn current(&self) -> NetworkKind {
        *self.kind.lock().unwrap_or_else(|p| p.into_inner())
    }
}
