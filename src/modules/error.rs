// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{
    container::Container,
    controller::{ActionResult, ActionTable, Controller},
    param::STATUS_CODES,
    route::Route,
};

pub struct IndexController {
    container: Container,
}

impl IndexController {
    fn index(&mut self, _params: &Route) -> ActionResult {
        let mut view = self.container.view();
        view.set_title("Bang");
        view.set_module_content("error", "<h1>bang</h1>");
        Ok(None)
    }

    fn error404(&mut self, _params: &Route) -> ActionResult {
        let reason = STATUS_CODES.get(&404).copied().unwrap_or("Not Found");
        let html = format!("<h1>404</h1><p>{}</p>", reason);

        let mut view = self.container.view();
        view.set_status(404);
        view.set_title("404");
        view.set_tpl_var("status", 404);
        view.set_tpl_var("error", reason);
        view.set_module_content("error", &html);
        Ok(Some(html))
    }
}

impl Controller for IndexController {
    fn new(container: &Container) -> Self {
        Self {
            container: container.clone(),
        }
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new()
            .action("index", Self::index)
            .action("error404", Self::error404)
    }
}
