use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;

use crate::repository::http::DEFAULT_API_URL;
use crate::view::SortOption;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "cstudio";
const DB_FILE_NAME: &str = "cstudio.db";
const LOG_FILE_NAME: &str = "cstudio.log";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub api_url: String,
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub default_sort: SortOption,
    pub notice_seconds: u64,
    pub keys: Keys,
    pub ui: UiConfig,
    /// Problems found while loading that did not stop it (unknown keys).
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Remote,
    Local,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_seconds)
    }

    /// Apply `--server` / `--local`. `--local` wins when both are given.
    pub fn with_overrides(mut self, server: Option<String>, local: bool) -> Self {
        if let Some(url) = server {
            self.api_url = url;
            self.backend = Backend::Remote;
        }
        if local {
            self.backend = Backend::Local;
        }
        self
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
    pub accent: RgbColor,
    pub error: RgbColor,
    pub success: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// =============================================================================
// Key Bindings - Context-aware with multiple bindings per action
// =============================================================================

/// All key bindings organized by context
#[derive(Debug, Clone)]
pub struct Keys {
    /// Active whenever no modal or input has focus
    pub global: GlobalKeys,
    /// Contact list actions
    pub list: ListKeys,
    /// Add/edit form and note editor
    pub form: FormKeys,
    /// Confirmation and help dialogs
    pub modal: ModalKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub search: Vec<String>,
    pub help: Vec<String>,
    pub refresh: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub page_down: Vec<String>,
    pub page_up: Vec<String>,
    pub add: Vec<String>,
    pub edit: Vec<String>,
    pub delete: Vec<String>,
    pub favorite: Vec<String>,
    pub pin: Vec<String>,
    pub note: Vec<String>,
    pub select: Vec<String>,
    pub select_all: Vec<String>,
    pub bulk_delete: Vec<String>,
    pub sort: Vec<String>,
    pub address_filter: Vec<String>,
    pub clear_filters: Vec<String>,
    pub export: Vec<String>,
    pub dismiss: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FormKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub next_field: Vec<String>,
    pub prev_field: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModalKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            global: GlobalKeys::default(),
            list: ListKeys::default(),
            form: FormKeys::default(),
            modal: ModalKeys::default(),
        }
    }
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: keys(&["q"]),
            search: keys(&["/"]),
            help: keys(&["?", "F1"]),
            refresh: keys(&["r", "F5"]),
        }
    }
}

impl Default for ListKeys {
    fn default() -> Self {
        Self {
            next: keys(&["j", "Down"]),
            prev: keys(&["k", "Up"]),
            page_down: keys(&["PageDown"]),
            page_up: keys(&["PageUp"]),
            add: keys(&["a"]),
            edit: keys(&["e", "Enter"]),
            delete: keys(&["d"]),
            favorite: keys(&["f"]),
            pin: keys(&["p"]),
            note: keys(&["n"]),
            select: keys(&["Space"]),
            select_all: keys(&["A"]),
            bulk_delete: keys(&["D"]),
            sort: keys(&["s"]),
            address_filter: keys(&["w"]),
            clear_filters: keys(&["c"]),
            export: keys(&["x"]),
            dismiss: keys(&["Esc"]),
        }
    }
}

impl Default for FormKeys {
    fn default() -> Self {
        Self {
            cancel: keys(&["Esc"]),
            confirm: keys(&["Enter"]),
            next_field: keys(&["Tab", "Down"]),
            prev_field: keys(&["BackTab", "Up"]),
        }
    }
}

impl Default for ModalKeys {
    fn default() -> Self {
        Self {
            cancel: keys(&["Esc", "n", "q"]),
            confirm: keys(&["Enter", "y"]),
            next: keys(&["j", "Down"]),
            prev: keys(&["k", "Up"]),
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

/// Missing entries keep the default binding.
fn binding_or(binding: Option<KeyBinding>, default: Vec<String>) -> Vec<String> {
    binding.map(KeyBinding::into_vec).unwrap_or(default)
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    list: ListKeysFile,
    form: FormKeysFile,
    modal: ModalKeysFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GlobalKeysFile {
    quit: Option<KeyBinding>,
    search: Option<KeyBinding>,
    help: Option<KeyBinding>,
    refresh: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListKeysFile {
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
    page_down: Option<KeyBinding>,
    page_up: Option<KeyBinding>,
    add: Option<KeyBinding>,
    edit: Option<KeyBinding>,
    delete: Option<KeyBinding>,
    favorite: Option<KeyBinding>,
    pin: Option<KeyBinding>,
    note: Option<KeyBinding>,
    select: Option<KeyBinding>,
    select_all: Option<KeyBinding>,
    bulk_delete: Option<KeyBinding>,
    sort: Option<KeyBinding>,
    address_filter: Option<KeyBinding>,
    clear_filters: Option<KeyBinding>,
    export: Option<KeyBinding>,
    dismiss: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FormKeysFile {
    cancel: Option<KeyBinding>,
    confirm: Option<KeyBinding>,
    next_field: Option<KeyBinding>,
    prev_field: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ModalKeysFile {
    cancel: Option<KeyBinding>,
    confirm: Option<KeyBinding>,
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: file.global.into(),
            list: file.list.into(),
            form: file.form.into(),
            modal: file.modal.into(),
        }
    }
}

impl From<GlobalKeysFile> for GlobalKeys {
    fn from(file: GlobalKeysFile) -> Self {
        let d = GlobalKeys::default();
        Self {
            quit: binding_or(file.quit, d.quit),
            search: binding_or(file.search, d.search),
            help: binding_or(file.help, d.help),
            refresh: binding_or(file.refresh, d.refresh),
        }
    }
}

impl From<ListKeysFile> for ListKeys {
    fn from(file: ListKeysFile) -> Self {
        let d = ListKeys::default();
        Self {
            next: binding_or(file.next, d.next),
            prev: binding_or(file.prev, d.prev),
            page_down: binding_or(file.page_down, d.page_down),
            page_up: binding_or(file.page_up, d.page_up),
            add: binding_or(file.add, d.add),
            edit: binding_or(file.edit, d.edit),
            delete: binding_or(file.delete, d.delete),
            favorite: binding_or(file.favorite, d.favorite),
            pin: binding_or(file.pin, d.pin),
            note: binding_or(file.note, d.note),
            select: binding_or(file.select, d.select),
            select_all: binding_or(file.select_all, d.select_all),
            bulk_delete: binding_or(file.bulk_delete, d.bulk_delete),
            sort: binding_or(file.sort, d.sort),
            address_filter: binding_or(file.address_filter, d.address_filter),
            clear_filters: binding_or(file.clear_filters, d.clear_filters),
            export: binding_or(file.export, d.export),
            dismiss: binding_or(file.dismiss, d.dismiss),
        }
    }
}

impl From<FormKeysFile> for FormKeys {
    fn from(file: FormKeysFile) -> Self {
        let d = FormKeys::default();
        Self {
            cancel: binding_or(file.cancel, d.cancel),
            confirm: binding_or(file.confirm, d.confirm),
            next_field: binding_or(file.next_field, d.next_field),
            prev_field: binding_or(file.prev_field, d.prev_field),
        }
    }
}

impl From<ModalKeysFile> for ModalKeys {
    fn from(file: ModalKeysFile) -> Self {
        let d = ModalKeys::default();
        Self {
            cancel: binding_or(file.cancel, d.cancel),
            confirm: binding_or(file.confirm, d.confirm),
            next: binding_or(file.next, d.next),
            prev: binding_or(file.prev, d.prev),
        }
    }
}

/// Normalize a key binding string to a canonical form for collision detection.
/// Single characters preserve case (since 'A' means Shift+a, different from 'a').
/// Multi-character key names are case-insensitive (Enter, ENTER, enter are the same).
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

/// Global keys stay live on the list, so the two are checked together.
fn validate_key_bindings(keys: &Keys) -> Result<()> {
    let g = &keys.global;
    let l = &keys.list;
    check_context_collisions(
        &[
            ("quit", &g.quit),
            ("search", &g.search),
            ("help", &g.help),
            ("refresh", &g.refresh),
            ("next", &l.next),
            ("prev", &l.prev),
            ("page_down", &l.page_down),
            ("page_up", &l.page_up),
            ("add", &l.add),
            ("edit", &l.edit),
            ("delete", &l.delete),
            ("favorite", &l.favorite),
            ("pin", &l.pin),
            ("note", &l.note),
            ("select", &l.select),
            ("select_all", &l.select_all),
            ("bulk_delete", &l.bulk_delete),
            ("sort", &l.sort),
            ("address_filter", &l.address_filter),
            ("clear_filters", &l.clear_filters),
            ("export", &l.export),
            ("dismiss", &l.dismiss),
        ],
        "list",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.form.cancel),
            ("confirm", &keys.form.confirm),
            ("next_field", &keys.form.next_field),
            ("prev_field", &keys.form.prev_field),
        ],
        "form",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.modal.cancel),
            ("confirm", &keys.modal.confirm),
            ("next", &keys.modal.next),
            ("prev", &keys.modal.prev),
        ],
        "modal",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    backend: Backend,
    data_dir: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    default_sort: SortOption,
    notice_seconds: Option<u64>,
    keys: KeysFile,
    ui: UiFile,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
    accent: RgbColor,
    error: RgbColor,
    success: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
            accent: RgbColor::new(255, 215, 0),
            error: RgbColor::new(235, 80, 80),
            success: RgbColor::new(90, 200, 120),
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        let c = file.colors;
        Self {
            colors: UiColors {
                border: c.border,
                selection_bg: c.selection_bg,
                selection_fg: c.selection_fg,
                separator: c.separator,
                status_fg: c.status_fg,
                status_bg: c.status_bg,
                accent: c.accent,
                error: c.error,
                success: c.success,
            },
        }
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load `explicit` or the default config file. Only an explicit path has to
/// exist; a missing default file yields the built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => expand_tilde(path),
        None => config_path()?,
    };

    if !path.exists() {
        if explicit.is_some() {
            bail!("configuration file not found at {}", path.display());
        }
        return parse("", path);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse(&raw, path)
}

fn parse(raw: &str, path: PathBuf) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    let warnings = unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let api_url = cfg_file
        .api_url
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    if api_url.is_empty() {
        bail!("`api_url` must not be empty");
    }

    let data_dir = match cfg_file.data_dir {
        Some(dir) => expand_tilde(&dir),
        None => default_data_dir()?,
    };
    let export_dir = cfg_file
        .export_dir
        .map(|dir| expand_tilde(&dir))
        .unwrap_or_else(|| PathBuf::from("."));

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    Ok(Config {
        config_path: path,
        api_url,
        backend: cfg_file.backend,
        data_dir,
        export_dir,
        default_sort: cfg_file.default_sort,
        notice_seconds: cfg_file.notice_seconds.unwrap_or(3),
        keys,
        ui: cfg_file.ui.into(),
        warnings,
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn unknown_keys(value: &toml::Value) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(table) = value.as_table() else {
        return warnings;
    };

    let known = HashSet::from([
        "api_url",
        "backend",
        "data_dir",
        "export_dir",
        "default_sort",
        "notice_seconds",
        "keys",
        "ui",
    ]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            warnings.push(format!("unknown configuration key `{}`", key));
        }
    }

    if let Some(keys_val) = table.get("keys") {
        unknown_keys_section(keys_val, &mut warnings);
    }

    if let Some(ui_val) = table.get("ui").and_then(|v| v.as_table()) {
        for key in ui_val.keys() {
            if key != "colors" {
                warnings.push(format!("unknown ui.* entry `{}`", key));
            }
        }
        if let Some(colors) = ui_val.get("colors") {
            unknown_in_table(
                colors,
                "ui.colors",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "separator",
                    "status_fg",
                    "status_bg",
                    "accent",
                    "error",
                    "success",
                ],
                &mut warnings,
            );
        }
    }

    warnings
}

fn unknown_keys_section(value: &toml::Value, warnings: &mut Vec<String>) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known_contexts = HashSet::from(["global", "list", "form", "modal"]);
    for key in table.keys() {
        if !known_contexts.contains(key.as_str()) {
            warnings.push(format!("unknown keys.* context `{}`", key));
        }
    }

    if let Some(v) = table.get("global") {
        unknown_in_table(v, "keys.global", &["quit", "search", "help", "refresh"], warnings);
    }
    if let Some(v) = table.get("list") {
        unknown_in_table(
            v,
            "keys.list",
            &[
                "next",
                "prev",
                "page_down",
                "page_up",
                "add",
                "edit",
                "delete",
                "favorite",
                "pin",
                "note",
                "select",
                "select_all",
                "bulk_delete",
                "sort",
                "address_filter",
                "clear_filters",
                "export",
                "dismiss",
            ],
            warnings,
        );
    }
    if let Some(v) = table.get("form") {
        unknown_in_table(
            v,
            "keys.form",
            &["cancel", "confirm", "next_field", "prev_field"],
            warnings,
        );
    }
    if let Some(v) = table.get("modal") {
        unknown_in_table(v, "keys.modal", &["cancel", "confirm", "next", "prev"], warnings);
    }
}

fn unknown_in_table(value: &toml::Value, context: &str, known: &[&str], warnings: &mut Vec<String>) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            warnings.push(format!("unknown {} entry `{}`", context, key));
        }
    }
}
