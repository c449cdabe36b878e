use std::path::{Path, PathBuf};
use std::sync::Arc;

use rstest::{fixture, rstest};
use tower_lsp::lsp_types::Position;

use super::*;
use crate::model::{BindingMode, MemberKind, Severity, Template, DEFAULT_CONTROLLER_AS};
use crate::util::camel_to_kebab;

/// テスト用のアナライザーとレジストリ
struct TestContext {
    analyzer: Analyzer,
    registry: Arc<SourceRegistry>,
}

impl TestContext {
    fn analyze(&self, path: &str, source: &str) -> FileAnalysis {
        self.analyzer.analyze_source(path, source).unwrap()
    }

    /// import先として参照されるファイルを登録する
    fn add_module(&self, path: &str, source: &str) {
        self.registry.insert_source(path, source).unwrap();
    }
}

#[fixture]
fn ctx() -> TestContext {
    let registry = Arc::new(SourceRegistry::new());
    let options = AnalyzerOptions {
        template_root: PathBuf::from("/workspace"),
        ..AnalyzerOptions::default()
    };
    let analyzer = Analyzer::new(Arc::clone(&registry), options);
    TestContext { analyzer, registry }
}

fn component<'a>(analysis: &'a FileAnalysis, name: &str) -> &'a Component {
    analysis
        .components
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("component '{}' not found", name))
}

// ==========================================================================
// コンポーネント名とバインディング
// ==========================================================================

#[rstest]
fn test_html_name_is_kebab_case(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "angular.module('app').component('userDetailCard', { template: '<p></p>' });",
    );

    let component = component(&analysis, "userDetailCard");
    assert_eq!(component.html_name, "user-detail-card");
    assert_eq!(camel_to_kebab(&component.html_name), component.html_name);
    assert_eq!(component.position, Position::new(0, 32));
}

#[rstest]
fn test_one_way_binding_and_default_alias(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
angular.module('app').component('userCard', {
    bindings: { user: '<' },
    template: '<p>{{$ctrl.user.name}}</p>'
});
"#,
    );

    let component = component(&analysis, "userCard");
    assert_eq!(component.bindings.len(), 1);
    let binding = &component.bindings[0];
    assert_eq!(binding.name, "user");
    assert_eq!(binding.html_name, "user");
    assert_eq!(binding.binding_type, "<");
    assert_eq!(binding.mode(), BindingMode::OneWay);
    assert_eq!(binding.position, Position::new(2, 16));
    assert_eq!(component.controller_as, DEFAULT_CONTROLLER_AS);
    assert!(analysis.diagnostics.is_empty());
}

#[rstest]
#[case("'<'", "<", "item")]
#[case("'=?'", "=?", "item")]
#[case("'@title'", "@", "title")]
#[case("'&onItemSaved'", "&", "on-item-saved")]
#[case("'<?selectedItem'", "<?", "selected-item")]
#[case("'  wat  '", "wat", "item")]
fn test_binding_specs(
    ctx: TestContext,
    #[case] spec: &str,
    #[case] binding_type: &str,
    #[case] html_name: &str,
) {
    let source = format!(
        "angular.module('app').component('list', {{ bindings: {{ item: {} }}, template: '' }});",
        spec
    );
    let analysis = ctx.analyze("/workspace/app.js", &source);

    let binding = component(&analysis, "list").binding("item").unwrap();
    assert_eq!(binding.binding_type, binding_type);
    assert_eq!(binding.html_name, html_name);
}

#[rstest]
fn test_binding_lookup_by_html_name(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "angular.module('app').component('list', { bindings: { onSelect: '&', maxItems: '<' }, template: '' });",
    );

    let component = component(&analysis, "list");
    assert_eq!(component.binding_by_html_name("max-items").unwrap().name, "maxItems");
    assert_eq!(
        component.binding_by_html_name("on-select").unwrap().mode(),
        BindingMode::Expression
    );
}

#[rstest]
fn test_non_string_binding_is_skipped_with_warning(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "angular.module('app').component('list', { bindings: { a: '<', b: 42 }, template: '' });",
    );

    let component = component(&analysis, "list");
    assert_eq!(component.bindings.len(), 1);
    assert_eq!(analysis.diagnostics.len(), 1);
    assert!(analysis.diagnostics[0].message.contains("Binding 'b'"));
}

#[rstest]
fn test_bindings_from_local_variable(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
const listBindings = { items: '<', onPick: '&' };
angular.module('app').component('list', { bindings: listBindings, template: '' });
"#,
    );

    let names: Vec<&str> = component(&analysis, "list")
        .bindings
        .iter()
        .map(|b| b.name.as_str())
        .collect();
    assert_eq!(names, vec!["items", "onPick"]);
}

#[rstest]
fn test_non_literal_name_is_skipped_silently(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
const NAME = 'constName';
angular.module('app')
    .component(buildName(), { template: '' })
    .component(NAME, { template: '' });
"#,
    );

    let names: Vec<&str> = analysis.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["constName"]);
    assert!(analysis.diagnostics.is_empty());
}

#[rstest]
fn test_components_in_source_order(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
angular.module('app')
    .component('first', { template: '' })
    .component('second', { template: '' })
    .component('third', { template: '' });
"#,
    );

    let names: Vec<&str> = analysis.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
}

// ==========================================================================
// 設定オブジェクトの解決
// ==========================================================================

#[rstest]
fn test_config_from_local_variable(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
var userCard = { bindings: { user: '<' }, template: '<p></p>' };
angular.module('app').component('userCard', userCard);
"#,
    );

    let component = component(&analysis, "userCard");
    assert_eq!(component.bindings[0].name, "user");
    assert_eq!(component.config_path, PathBuf::from("/workspace/app.js"));
}

#[rstest]
fn test_config_from_options_class(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.ts",
        r#"
class UserCardOptions implements ng.IComponentOptions {
    bindings = { user: '<', onSave: '&saved' };
    template = '<p></p>';
    controllerAs = 'vm';
    controller = UserCardController;
}

class UserCardController {
    user: User;
    save(): void {}
}

angular.module('app').component('userCard', new UserCardOptions());
"#,
    );

    assert_eq!(analysis.controllers.len(), 1);
    let component = component(&analysis, "userCard");
    assert_eq!(component.controller_as, "vm");
    assert_eq!(component.binding("onSave").unwrap().html_name, "saved");
    let controller = component.controller.as_ref().unwrap();
    assert_eq!(controller.name, "UserCardController");
    assert!(Arc::ptr_eq(controller, &analysis.controllers[0]));
}

#[rstest]
fn test_import_chain_attributes_origin(ctx: TestContext) {
    ctx.add_module("/workspace/src/b.ts", "export { cardConfig } from './config/c';");
    ctx.add_module(
        "/workspace/src/config/c.ts",
        r#"
export const cardConfig = {
    bindings: { user: '<' },
    templateUrl: 'views/card.html'
};
"#,
    );
    let analysis = ctx.analyze(
        "/workspace/src/a.ts",
        "import { cardConfig } from './b';\nangular.module('app').component('card', cardConfig);",
    );

    let component = component(&analysis, "card");
    assert_eq!(component.path, PathBuf::from("/workspace/src/a.ts"));
    assert_eq!(component.config_path, PathBuf::from("/workspace/src/config/c.ts"));
    assert_eq!(component.bindings[0].position, Position::new(2, 16));
    assert_eq!(
        ctx.registry.origin("card").as_deref(),
        Some(Path::new("/workspace/src/config/c.ts"))
    );
}

#[rstest]
fn test_unsupported_config_does_not_stop_other_registrations(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
angular.module('app')
    .component('broken', buildConfig())
    .component('working', { template: '<p></p>' })
    .component('missing', notDeclaredAnywhere);
"#,
    );

    let names: Vec<&str> = analysis.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["working"]);

    let messages: Vec<&str> = analysis.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.contains("Unsupported configuration")));
    assert!(messages.iter().any(|m| m.contains("'broken'") && m.contains("call expression")));
    assert!(messages.iter().any(|m| m.contains("'missing'") && m.contains("notDeclaredAnywhere")));
    assert!(analysis.diagnostics.iter().all(|d| d.severity == Severity::Warning));
}

#[rstest]
fn test_function_config_is_unsupported(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "function makeConfig() { return {}; }\nangular.module('app').component('x', makeConfig);",
    );

    assert!(analysis.components.is_empty());
    assert!(analysis.diagnostics[0].message.contains("resolves to a function"));
}

// ==========================================================================
// テンプレート
// ==========================================================================

#[rstest]
fn test_template_url_takes_precedence(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
angular.module('app').component('page', {
    template: '<p>inline</p>',
    templateUrl: 'app/page.html'
});
"#,
    );

    assert_eq!(
        component(&analysis, "page").template,
        Some(Template::external(PathBuf::from("/workspace/app/page.html")))
    );
}

#[rstest]
fn test_missing_template_is_a_warning(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "angular.module('app').component('bare', { bindings: {} });",
    );

    let component = component(&analysis, "bare");
    assert!(component.template.is_none());
    assert_eq!(analysis.diagnostics.len(), 1);
    assert!(analysis.diagnostics[0].message.contains("no template"));
}

#[rstest]
fn test_inline_template_escapes_are_decoded(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"angular.module('app').component('note', { template: '<p class=\'x\'>it\'s</p>' });"#,
    );

    let template = component(&analysis, "note").template.clone().unwrap();
    assert_eq!(template.body.as_deref(), Some("<p class='x'>it's</p>"));
}

#[rstest]
fn test_required_template_is_relative_to_declaring_file(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/src/card/card.component.js",
        "angular.module('app').component('card', { template: require('./card.html') });",
    );

    let template = component(&analysis, "card").template.clone().unwrap();
    assert_eq!(template.path, PathBuf::from("/workspace/src/card/card.html"));
    assert_eq!(template.position, Position::new(0, 0));
}

// ==========================================================================
// コントローラー
// ==========================================================================

#[rstest]
fn test_legacy_controller_members(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
function UserController(UserService) {
    var self = this;
    self.users = [];
    this.title = 'Users';
    self.load = function (id) { return UserService.get(id); };
    this.clear = () => { self.users = []; };
    UserService.cache = {};
    var local = 1;
}

angular.module('app').component('userList', {
    controller: 'UserController',
    template: '<ul></ul>'
});
"#,
    );

    let controller = component(&analysis, "userList").controller.clone().unwrap();
    let members: Vec<(&str, MemberKind)> = controller
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.kind))
        .collect();
    assert_eq!(
        members,
        vec![
            ("users", MemberKind::Property),
            ("title", MemberKind::Property),
            ("load", MemberKind::Method),
            ("clear", MemberKind::Method),
        ]
    );
    assert_eq!(controller.member("title").unwrap().type_tag.to_string(), "string");
    assert_eq!(controller.member("load").unwrap().parameters[0].name, "id");
}

#[rstest]
fn test_controller_rename_before_declaration(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
angular.module('app')
    .controller('PublicCtrl', LocalCtrl)
    .component('widget', { controller: 'PublicCtrl', template: '' })
    .component('other', { controller: LocalCtrl, template: '' });

function LocalCtrl() {
    this.value = 1;
}
"#,
    );

    assert_eq!(analysis.controllers.len(), 1);
    assert_eq!(analysis.controllers[0].name, "PublicCtrl");
    assert_eq!(analysis.controllers[0].class_name, "LocalCtrl");

    let by_name = component(&analysis, "widget").controller.clone().unwrap();
    let by_identifier = component(&analysis, "other").controller.clone().unwrap();
    assert!(Arc::ptr_eq(&by_name, &by_identifier));
}

#[rstest]
fn test_inline_controller(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        r#"
angular.module('app').component('counter', {
    template: '<button ng-click="$ctrl.increment()">{{$ctrl.count}}</button>',
    controller: ['$log', function ($log) {
        this.count = 0;
        this.increment = function () { this.count++; };
    }]
});
"#,
    );

    let controller = component(&analysis, "counter").controller.clone().unwrap();
    assert_eq!(controller.name, "counterController");
    assert_eq!(controller.class_name, "counterController");
    assert!(controller.member("increment").unwrap().is_method());
    assert_eq!(controller.member("count").unwrap().type_tag.to_string(), "number");
}

#[rstest]
fn test_missing_controller_is_a_warning(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "angular.module('app').component('x', { controller: 'Nowhere', template: '' });",
    );

    let component = component(&analysis, "x");
    assert!(component.controller.is_none());
    assert_eq!(analysis.diagnostics.len(), 1);
    assert!(analysis.diagnostics[0].message.contains("'Nowhere'"));
}

#[rstest]
fn test_non_literal_controller_as_falls_back(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/app.js",
        "angular.module('app').component('x', { controllerAs: alias, template: '' });",
    );

    assert_eq!(component(&analysis, "x").controller_as, DEFAULT_CONTROLLER_AS);
    assert_eq!(analysis.diagnostics.len(), 1);
}

#[rstest]
fn test_typescript_controller_class(ctx: TestContext) {
    let analysis = ctx.analyze(
        "/workspace/user.component.ts",
        r#"
export class UserController extends BaseController {
    static $inject = ['$http'];
    private cache: Map<string, User>;
    selected?: User;

    constructor(private $http: ng.IHttpService) {
        super();
    }

    get count(): number { return 0; }

    load(id: number, force = false): Promise<User> {
        return this.$http.get('/users/' + id);
    }

    onSelect = (user: User) => this.selected = user;
}

export const userComponent: ng.IComponentOptions = {
    controller: UserController,
    templateUrl: '/views/user.html',
};

angular.module('app').component('user', userComponent);
"#,
    );

    let component = component(&analysis, "user");
    let controller = component.controller.as_ref().unwrap();
    assert_eq!(controller.base_class_name.as_deref(), Some("BaseController"));

    let names: Vec<&str> = controller.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["cache", "selected", "$http", "count", "load", "onSelect"]);
    assert_eq!(
        controller.member("load").unwrap().signature(),
        "load(id: number, force: boolean): Promise<User>"
    );
    assert_eq!(
        component.template,
        Some(Template::external(PathBuf::from("/workspace/views/user.html")))
    );
}
