//! Custom menus (default and conditional).
//!
//! A menu with a `matchrule` is a conditional menu and goes through
//! `/cgi-bin/menu/addconditional`; otherwise `/cgi-bin/menu/create` replaces
//! the default menu.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::{Ack, WxOpenClient};
use crate::error::mask_id;
use crate::{Error, Result};

/// errcode returned by menu/get when no menu is configured
pub const MENU_NOT_EXIST: i64 = 46003;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Menu {
    #[serde(default)]
    pub button: Vec<MenuButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matchrule: Option<MenuRule>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MenuButton {
    /// click, view, scancode_push, miniprogram, media_id, ...
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagepath: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_button: Vec<MenuButton>,
}

impl MenuButton {
    pub fn click(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: Some("click".into()),
            name: name.into(),
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn view(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: Some("view".into()),
            name: name.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Top-level button that only opens a sub menu.
    pub fn parent(name: impl Into<String>, sub_button: Vec<MenuButton>) -> Self {
        Self {
            name: name.into(),
            sub_button,
            ..Default::default()
        }
    }
}

/// Conditions of a conditional menu; unset fields match everyone.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MenuRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    /// "1" male, "2" female
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// "1" iOS, "2" Android, "3" others
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_platform_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Menu with the id upstream assigned to it
#[derive(Clone, Debug, Deserialize)]
pub struct MenuWithId {
    #[serde(default)]
    pub button: Vec<MenuButton>,
    #[serde(default)]
    pub matchrule: Option<MenuRule>,
    #[serde(default)]
    pub menuid: Option<serde_json::Value>,
}

impl MenuWithId {
    pub fn menu_id(&self) -> Option<String> {
        self.menuid.as_ref().map(id_string)
    }
}

/// menu/get result: default menu plus conditional menus
#[derive(Clone, Debug, Deserialize)]
pub struct MenuInfo {
    pub menu: MenuWithId,
    #[serde(default, rename = "conditionalmenu")]
    pub conditional_menus: Vec<MenuWithId>,
}

fn id_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Menu {
    pub fn new(button: Vec<MenuButton>) -> Self {
        Self {
            button,
            matchrule: None,
        }
    }

    pub fn with_rule(mut self, rule: MenuRule) -> Self {
        self.matchrule = Some(rule);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl WxOpenClient {
    /// Create the default menu, or a conditional one when `matchrule` is set.
    /// Returns the menuid of a conditional menu.
    #[instrument(level = "debug", skip(self, menu))]
    pub async fn menu_create(&self, menu: &Menu) -> Result<Option<String>> {
        if menu.matchrule.is_some() {
            #[derive(Deserialize)]
            struct Created {
                menuid: serde_json::Value,
            }
            let created: Created = self.post("/cgi-bin/menu/addconditional", menu).await?;
            let id = id_string(&created.menuid);
            info!(menuid = %id, "conditional menu created");
            Ok(Some(id))
        } else {
            let _: Ack = self.post("/cgi-bin/menu/create", menu).await?;
            info!(buttons = menu.button.len(), "menu created");
            Ok(None)
        }
    }

    /// Current menus, `None` when the account has no menu.
    pub async fn menu_get(&self) -> Result<Option<MenuInfo>> {
        match self.get::<MenuInfo>("/cgi-bin/menu/get", &[]).await {
            Ok(info) => Ok(Some(info)),
            Err(Error::Wx { code, .. }) if code == MENU_NOT_EXIST => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete every menu including conditional ones.
    pub async fn menu_delete(&self) -> Result<()> {
        let _: Ack = self.get("/cgi-bin/menu/delete", &[]).await?;
        Ok(())
    }

    pub async fn menu_delete_conditional(&self, menu_id: &str) -> Result<()> {
        let body = serde_json::json!({ "menuid": menu_id });
        let _: Ack = self.post("/cgi-bin/menu/delconditional", &body).await?;
        Ok(())
    }

    /// Menu a given user (openid or WeChat id) would see.
    #[instrument(level = "debug", skip(self))]
    pub async fn menu_try_match(&self, user_id: &str) -> Result<Menu> {
        tracing::debug!(user = %mask_id(user_id), "menu trymatch");
        let body = serde_json::json!({ "user_id": user_id });
        self.post("/cgi-bin/menu/trymatch", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn menu_json_skips_unset_fields() {
        let menu = Menu::new(vec![
            MenuButton::click("今日歌曲", "V1001_TODAY_MUSIC"),
            MenuButton::parent(
                "菜单",
                vec![MenuButton::view("搜索", "http://www.soso.com/")],
            ),
        ]);
        let v = serde_json::to_value(&menu).expect("json");
        assert_eq!(
            v,
            json!({
                "button": [
                    {"type": "click", "name": "今日歌曲", "key": "V1001_TODAY_MUSIC"},
                    {"name": "菜单", "sub_button": [
                        {"type": "view", "name": "搜索", "url": "http://www.soso.com/"}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn matchrule_only_has_set_fields() {
        let menu = Menu::new(vec![MenuButton::click("a", "b")]).with_rule(MenuRule {
            tag_id: Some("2".into()),
            client_platform_type: Some("2".into()),
            ..Default::default()
        });
        let v = serde_json::to_value(&menu).expect("json");
        assert_eq!(v["matchrule"], json!({"tag_id": "2", "client_platform_type": "2"}));
    }

    #[test]
    fn parses_menu_get_with_numeric_and_string_ids() {
        let body = r#"{
            "menu":{"button":[{"type":"click","name":"x","key":"k","sub_button":[]}],"menuid":208396938},
            "conditionalmenu":[{"button":[],"matchrule":{"tag_id":"2"},"menuid":"208396993"}]
        }"#;
        let info: MenuInfo = serde_json::from_str(body).expect("parse");
        assert_eq!(info.menu.menu_id().as_deref(), Some("208396938"));
        assert_eq!(info.menu.button[0].key.as_deref(), Some("k"));
        assert_eq!(info.conditional_menus[0].menu_id().as_deref(), Some("208396993"));
        assert_eq!(
            info.conditional_menus[0]
                .matchrule
                .as_ref()
                .and_then(|r| r.tag_id.as_deref()),
            Some("2")
        );
    }
}
