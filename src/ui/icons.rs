pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const BRAIN: &str = "🧠";
    pub const FILE: &str = "📄";
    pub const DATABASE: &str = "🗄️";
    pub const CLOCK: &str = "⏱️";
    pub const RIGHT: &str = "➡️";
    pub const CYCLE: &str = "🔁";
    pub const HOTSPOT: &str = "🔥";
}
