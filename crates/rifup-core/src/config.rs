//! interfaces(5)-style configuration parsing.
//!
//! The parser is line-oriented and forgiving: malformed stanza content
//! is recorded on the interface (`has_config_error`) and logged, so a
//! single broken stanza never takes down the whole run. Only an
//! unreadable file is a hard error.

use std::fs;
use std::path::Path;
use tracing::warn;

use crate::collection::InterfaceCollection;
use crate::error::{IfupError, IfupResult};
use crate::interface::Address;

/// Parser state threaded through every keyword handler.
struct ParseState<'a> {
    collection: &'a mut InterfaceCollection,
    current: Option<String>,
    lineno: usize,
}

impl ParseState<'_> {
    /// Records a configuration error against the named interface.
    fn config_error(&mut self, name: &str, message: &str) {
        warn!(line = self.lineno, interface = name, "{message}");
        self.collection.find_or_create(name).has_config_error = true;
    }

    /// The current stanza name, or `None` with a warning for a
    /// directive that appeared outside any stanza.
    fn current_or_warn(&mut self, keyword: &str) -> Option<String> {
        if self.current.is_none() {
            warn!(
                line = self.lineno,
                keyword, "directive outside an interface stanza, ignoring"
            );
        }
        self.current.clone()
    }
}

/// Parses the file at `path` into `collection`.
pub fn load(path: &Path, collection: &mut InterfaceCollection) -> IfupResult<()> {
    let text = fs::read_to_string(path).map_err(|e| IfupError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&text, collection);
    Ok(())
}

/// Parses configuration text into `collection`.
pub fn parse(text: &str, collection: &mut InterfaceCollection) {
    let mut st = ParseState {
        collection,
        current: None,
        lineno: 0,
    };
    for line in text.lines() {
        st.lineno += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else { continue };
        let args: Vec<&str> = tokens.collect();
        handle_line(&mut st, keyword, &args);
    }
}

fn handle_line(st: &mut ParseState, keyword: &str, args: &[&str]) {
    match keyword {
        "auto" | "allow-auto" => handle_auto(st, args),
        "iface" => handle_stanza(st, args, false),
        "template" => handle_stanza(st, args, true),
        "inherit" | "inherits" => handle_inherit(st, args),
        "use" => handle_use(st, args),
        "requires" => handle_requires(st, args),
        "address" => handle_address(st, args),
        "bridge-ports" => handle_members(st, "bridge-ports", args, true),
        "bond-slaves" | "bond-members" => handle_members(st, keyword, args, false),
        _ => handle_generic(st, keyword, args),
    }
}

fn handle_auto(st: &mut ParseState, args: &[&str]) {
    for name in args {
        st.collection.find_or_create(name).is_auto = true;
    }
}

fn handle_stanza(st: &mut ParseState, args: &[&str], template: bool) {
    let Some(&name) = args.first() else {
        warn!(line = st.lineno, "stanza with no interface name, ignoring");
        return;
    };
    if template {
        st.collection.find_or_create(name).is_template = true;
    } else {
        st.collection.find_or_create(name);
    }
    st.current = Some(name.to_string());

    // trailing stanza tokens: legacy `iface eth0 inet dhcp` syntax
    // and inline `inherits <template>`
    let mut rest = args[1..].iter();
    while let Some(&token) = rest.next() {
        match token {
            "inet" | "inet6" | "manual" => {}
            "inherits" => match rest.next() {
                Some(&target) => apply_inherit(st, name, target),
                None => st.config_error(name, "inherits without a template name"),
            },
            "dhcp" | "loopback" | "static" | "ppp" => {
                st.collection
                    .find_or_create(name)
                    .vars
                    .push_unique("use", token);
            }
            other => {
                warn!(line = st.lineno, token = other, "ignoring unknown stanza token");
            }
        }
    }
}

fn handle_inherit(st: &mut ParseState, args: &[&str]) {
    let Some(current) = st.current_or_warn("inherit") else {
        return;
    };
    match args.first() {
        Some(&target) => apply_inherit(st, &current, target),
        None => st.config_error(&current, "inherit requires a template name"),
    }
}

/// Copies a template's variables and type flags into `name`. Entries
/// the interface already carries are not duplicated.
fn apply_inherit(st: &mut ParseState, name: &str, target: &str) {
    let Some(template) = st.collection.get(target).cloned() else {
        st.config_error(name, "inherit target is not defined");
        return;
    };
    let iface = st.collection.find_or_create(name);
    iface.is_bridge |= template.is_bridge;
    iface.is_bond |= template.is_bond;
    for (key, value) in template.vars.iter() {
        iface.vars.push_unique(key, value);
    }
}

fn handle_use(st: &mut ParseState, args: &[&str]) {
    let Some(current) = st.current_or_warn("use") else {
        return;
    };
    let iface = st.collection.find_or_create(&current);
    for &executor in args {
        iface.vars.push_unique("use", executor);
        match executor {
            "bridge" => iface.is_bridge = true,
            "bond" => iface.is_bond = true,
            _ => {}
        }
    }
}

fn handle_requires(st: &mut ParseState, args: &[&str]) {
    let Some(current) = st.current_or_warn("requires") else {
        return;
    };
    if args.is_empty() {
        st.config_error(&current, "requires with no interface names");
        return;
    }
    st.collection
        .find_or_create(&current)
        .vars
        .push("requires", args.join(" "));
}

fn handle_address(st: &mut ParseState, args: &[&str]) {
    let Some(current) = st.current_or_warn("address") else {
        return;
    };
    let Some(&value) = args.first() else {
        st.config_error(&current, "address with no value");
        return;
    };
    match Address::parse(value) {
        Some(addr) => {
            let iface = st.collection.find_or_create(&current);
            // a static address implies the static executor
            if !iface.executors().any(|e| e == "static") {
                iface.vars.push("use", "static");
            }
            iface.vars.push("address", addr.to_string());
        }
        None => st.config_error(&current, "malformed address"),
    }
}

fn handle_members(st: &mut ParseState, keyword: &str, args: &[&str], bridge: bool) {
    let Some(current) = st.current_or_warn(keyword) else {
        return;
    };
    if args.is_empty() {
        st.config_error(&current, "member list with no interface names");
        return;
    }
    let joined = args.join(" ");
    let iface = st.collection.find_or_create(&current);
    if bridge {
        iface.is_bridge = true;
    } else {
        iface.is_bond = true;
    }
    iface.vars.push(keyword, joined.clone());
    // members are dependencies: configured before, deconfigured after
    iface.vars.push("requires", joined);
}

fn handle_generic(st: &mut ParseState, keyword: &str, args: &[&str]) {
    let Some(current) = st.current_or_warn(keyword) else {
        return;
    };
    st.collection
        .find_or_create(&current)
        .vars
        .push(keyword, args.join(" "));
}
