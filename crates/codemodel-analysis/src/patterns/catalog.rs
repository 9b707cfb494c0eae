use super::{ExtraEdge, Link, NameRule, PatternTemplate, Role};
use codemodel_core::{Direction, Modifier, RelationKind, SymbolKind};

/// Anti-pattern detected by size thresholds rather than a template.
pub const GOD_OBJECT: &str = "GodObject";

const CLASS: &[SymbolKind] = &[SymbolKind::Class];
const TYPE: &[SymbolKind] = &[SymbolKind::Class, SymbolKind::Interface];
const METHOD: &[SymbolKind] = &[SymbolKind::Method, SymbolKind::Function];
const STATE: &[SymbolKind] = &[SymbolKind::Field, SymbolKind::Variable];

const USES: &[RelationKind] = &[RelationKind::Calls, RelationKind::References];

const fn anchor(name: &'static str, kinds: &'static [SymbolKind]) -> Role {
    Role {
        name,
        kinds,
        link: Link::Anchor,
        names: NameRule::Any,
        required_modifiers: &[],
        optional: false,
    }
}

const fn member(name: &'static str, owner: usize, kinds: &'static [SymbolKind], names: NameRule) -> Role {
    Role {
        name,
        kinds,
        link: Link::MemberOf(owner),
        names,
        required_modifiers: &[],
        optional: false,
    }
}

const fn linked(
    name: &'static str,
    from: usize,
    kinds: &'static [RelationKind],
    direction: Direction,
    symbol_kinds: &'static [SymbolKind],
) -> Role {
    Role {
        name,
        kinds: symbol_kinds,
        link: Link::Edge {
            from,
            kinds,
            direction,
        },
        names: NameRule::Any,
        required_modifiers: &[],
        optional: false,
    }
}

const fn optional(role: Role) -> Role {
    Role {
        optional: true,
        ..role
    }
}

const fn with_modifiers(role: Role, modifiers: &'static [Modifier]) -> Role {
    Role {
        required_modifiers: modifiers,
        ..role
    }
}

const SINGLETON: PatternTemplate = PatternTemplate {
    name: "Singleton",
    description: "Class holding a static reference to its only instance behind a private constructor",
    anti_pattern: false,
    base_confidence: 0.95,
    roles: &[
        anchor("class", CLASS),
        with_modifiers(member("instance", 0, STATE, NameRule::Any), &[Modifier::Static]),
        with_modifiers(
            member("constructor", 0, METHOD, NameRule::ConstructorOf(0)),
            &[Modifier::Private],
        ),
        optional(with_modifiers(
            member(
                "accessor",
                0,
                METHOD,
                NameRule::Contains(&["instance", "shared", "default", "singleton"]),
            ),
            &[Modifier::Static],
        )),
    ],
    extra_edges: &[ExtraEdge {
        from: 1,
        to: 0,
        kinds: &[RelationKind::References],
    }],
    same_module: false,
};

const FACTORY: PatternTemplate = PatternTemplate {
    name: "Factory",
    description: "Creation function choosing and instantiating concrete classes",
    anti_pattern: false,
    base_confidence: 0.8,
    roles: &[
        Role {
            names: NameRule::Prefix(&["create", "make", "factory", "new_", "build_"]),
            ..anchor("factory", METHOD)
        },
        linked("product", 0, USES, Direction::Outgoing, CLASS),
        optional(linked("alternative", 0, USES, Direction::Outgoing, CLASS)),
    ],
    extra_edges: &[],
    same_module: false,
};

const OBSERVER: PatternTemplate = PatternTemplate {
    name: "Observer",
    description: "Subject keeping a list of listeners and notifying them of changes",
    anti_pattern: false,
    base_confidence: 0.9,
    roles: &[
        anchor("subject", CLASS),
        member(
            "subscribe",
            0,
            METHOD,
            NameRule::Prefix(&["subscribe", "attach", "add_listener", "addlistener", "add_observer", "addobserver", "register"]),
        ),
        member(
            "notify",
            0,
            METHOD,
            NameRule::Prefix(&["notify", "emit", "publish", "dispatch", "fire", "broadcast"]),
        ),
        optional(linked("handler", 2, &[RelationKind::Calls], Direction::Outgoing, METHOD)),
        optional(member("listeners", 0, STATE, NameRule::Any)),
    ],
    extra_edges: &[ExtraEdge {
        from: 1,
        to: 4,
        kinds: &[RelationKind::WritesTo],
    }],
    same_module: false,
};

const BUILDER: PatternTemplate = PatternTemplate {
    name: "Builder",
    description: "Object assembled step by step through chained setters and a final build call",
    anti_pattern: false,
    base_confidence: 0.85,
    roles: &[
        anchor("builder", CLASS),
        member("build", 0, METHOD, NameRule::Prefix(&["build"])),
        member("step", 0, METHOD, NameRule::Prefix(&["with_", "with", "set_", "set", "add_"])),
        optional(linked("product", 1, USES, Direction::Outgoing, CLASS)),
    ],
    extra_edges: &[ExtraEdge {
        from: 2,
        to: 0,
        kinds: &[RelationKind::References],
    }],
    same_module: false,
};

const DECORATOR: PatternTemplate = PatternTemplate {
    name: "Decorator",
    description: "Wrapper sharing its component's interface and delegating to a wrapped instance",
    anti_pattern: false,
    base_confidence: 0.85,
    roles: &[
        anchor("decorator", CLASS),
        linked("component", 0, &[RelationKind::Inherits], Direction::Outgoing, TYPE),
        member("wrapped", 0, STATE, NameRule::Any),
        optional(member("delegate", 0, METHOD, NameRule::Any)),
    ],
    extra_edges: &[
        ExtraEdge {
            from: 2,
            to: 1,
            kinds: &[RelationKind::References],
        },
        ExtraEdge {
            from: 3,
            to: 2,
            kinds: &[RelationKind::ReadsFrom],
        },
    ],
    same_module: false,
};

const REPOSITORY: PatternTemplate = PatternTemplate {
    name: "Repository",
    description: "Collection-like access layer with finder and persistence methods for an entity",
    anti_pattern: false,
    base_confidence: 0.8,
    roles: &[
        anchor("repository", CLASS),
        member(
            "finder",
            0,
            METHOD,
            NameRule::Prefix(&["find", "get", "fetch", "load", "query", "list"]),
        ),
        member(
            "persister",
            0,
            METHOD,
            NameRule::Prefix(&["save", "store", "insert", "update", "delete", "remove", "persist", "add"]),
        ),
        optional(linked("entity", 1, USES, Direction::Outgoing, CLASS)),
    ],
    extra_edges: &[],
    same_module: false,
};

const MVC: PatternTemplate = PatternTemplate {
    name: "MVC",
    description: "Controller in one module driving a model and a view",
    anti_pattern: false,
    base_confidence: 0.8,
    roles: &[
        Role {
            names: NameRule::Contains(&["controller"]),
            ..anchor("controller", CLASS)
        },
        Role {
            names: NameRule::Contains(&["model"]),
            ..linked("model", 0, USES, Direction::Outgoing, CLASS)
        },
        Role {
            names: NameRule::Contains(&["view"]),
            ..linked("view", 0, USES, Direction::Outgoing, CLASS)
        },
    ],
    extra_edges: &[],
    same_module: true,
};

const DEPENDENCY_INJECTION: PatternTemplate = PatternTemplate {
    name: "DependencyInjection",
    description: "Class receiving an abstraction through its constructor instead of building the implementation",
    anti_pattern: false,
    base_confidence: 0.75,
    roles: &[
        anchor("client", CLASS),
        member("constructor", 0, METHOD, NameRule::ConstructorOf(0)),
        linked("dependency", 1, &[RelationKind::References], Direction::Outgoing, TYPE),
        linked("implementation", 2, &[RelationKind::Inherits], Direction::Incoming, CLASS),
    ],
    extra_edges: &[],
    same_module: false,
};

const CATALOG: &[PatternTemplate] = &[
    SINGLETON,
    FACTORY,
    OBSERVER,
    BUILDER,
    DECORATOR,
    REPOSITORY,
    MVC,
    DEPENDENCY_INJECTION,
];

/// Template-matched catalog entries. [`GOD_OBJECT`] is detected separately.
pub fn catalog() -> &'static [PatternTemplate] {
    CATALOG
}
