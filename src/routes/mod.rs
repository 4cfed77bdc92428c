// Route-definition tree
//
// Each file below is one HTTP path; its location decides the path and the
// functions it exports decide the methods. Keep ROUTE_FILES in step with the
// files on disk.

use crate::registrar::RouteFile;

#[path = "api/client.rs"]
mod client;

#[path = "api/users/@me/index.rs"]
mod users_me;

#[path = "api/guilds/[guild]/index.rs"]
mod guild;
#[path = "api/guilds/[guild]/members/index.rs"]
mod guild_members;

#[path = "api/admin/guilds/[guild]/index.rs"]
mod admin_guild;

pub const ROUTE_FILES: &[RouteFile] = &[
    RouteFile {
        source: "api/admin/guilds/[guild]/index.rs",
        methods: &[("get", admin_guild::get)],
    },
    RouteFile {
        source: "api/client.rs",
        methods: &[("get", client::get)],
    },
    RouteFile {
        source: "api/guilds/[guild]/index.rs",
        methods: &[("get", guild::get)],
    },
    RouteFile {
        source: "api/guilds/[guild]/members/index.rs",
        methods: &[("get", guild_members::get), ("post", guild_members::post)],
    },
    RouteFile {
        source: "api/users/@me/index.rs",
        methods: &[("get", users_me::get)],
    },
];
