use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

/// Operating system of the client.
#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceOS {
    Android = 1,
    Ios = 2,
    Osx = 3,
    FireOS = 4,
    GearVR = 5,
    Hololens = 6,
    Win10 = 7,
    Win32 = 8,
    Dedicated = 9,
    TvOS = 10,
    Orbis = 11,
    Nx = 12,
    Xbox = 13,
    WindowsPhone = 14,
}

/// The body of the user-chain token: skin blobs, device fingerprints,
/// input configuration and the address the client believes it is
/// connecting to.
///
/// `server_address` must equal the address advertised to the peer at
/// login time; real servers reject mismatches. Unknown fields are kept
/// in `extra` so a relay reproduces the payload faithfully.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserPayload {
    #[serde(rename = "ServerAddress")]
    pub server_address: String,
    #[serde(rename = "ClientRandomId")]
    pub client_random_id: i64,
    #[serde(rename = "SelfSignedId")]
    pub self_signed_id: Uuid,
    #[serde(rename = "DeviceId")]
    pub device_id: String,
    #[serde(rename = "DeviceModel")]
    pub device_model: String,
    #[serde(rename = "DeviceOS")]
    pub device_os: DeviceOS,
    #[serde(rename = "CurrentInputMode")]
    pub current_input_mode: u32,
    #[serde(rename = "DefaultInputMode")]
    pub default_input_mode: u32,
    #[serde(rename = "GuiScale")]
    pub gui_scale: i32,
    #[serde(rename = "UIProfile")]
    pub ui_profile: u32,
    #[serde(rename = "LanguageCode")]
    pub language_code: String,
    #[serde(rename = "GameVersion")]
    pub game_version: String,
    #[serde(rename = "MaxViewDistance")]
    pub max_view_distance: u32,
    #[serde(rename = "PlatformOfflineId")]
    pub platform_offline_id: String,
    #[serde(rename = "PlatformOnlineId")]
    pub platform_online_id: String,
    #[serde(rename = "ThirdPartyName")]
    pub third_party_name: String,
    #[serde(rename = "ThirdPartyNameOnly")]
    pub third_party_name_only: bool,
    #[serde(rename = "SkinId")]
    pub skin_id: String,
    #[serde(rename = "SkinData")]
    pub skin_data: String,
    #[serde(rename = "SkinImageWidth")]
    pub skin_image_width: u32,
    #[serde(rename = "SkinImageHeight")]
    pub skin_image_height: u32,
    #[serde(rename = "SkinResourcePatch")]
    pub skin_resource_patch: String,
    #[serde(rename = "SkinGeometryData")]
    pub skin_geometry_data: String,
    #[serde(rename = "PremiumSkin")]
    pub premium_skin: bool,
    #[serde(rename = "PersonaSkin")]
    pub persona_skin: bool,
    /// Fields this build does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserPayload {
    /// A plausible payload for a headless client talking to the given
    /// address.
    pub fn for_address(server_address: impl Into<String>, third_party_name: &str) -> Self {
        Self {
            server_address: server_address.into(),
            client_random_id: rand::random(),
            self_signed_id: Uuid::new_v4(),
            device_id: Uuid::new_v4().to_string(),
            device_model: "basalt".to_owned(),
            device_os: DeviceOS::Win10,
            current_input_mode: 1,
            default_input_mode: 1,
            gui_scale: 0,
            ui_profile: 0,
            language_code: "en_GB".to_owned(),
            game_version: crate::bedrock::CLIENT_VERSION_STRING.to_owned(),
            max_view_distance: 10,
            platform_offline_id: String::new(),
            platform_online_id: String::new(),
            third_party_name: third_party_name.to_owned(),
            third_party_name_only: false,
            skin_id: Uuid::new_v4().to_string(),
            skin_data: String::new(),
            skin_image_width: 0,
            skin_image_height: 0,
            skin_resource_patch: String::new(),
            skin_geometry_data: String::new(),
            premium_skin: false,
            persona_skin: false,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_a_roundtrip() {
        let mut payload = UserPayload::for_address("127.0.0.1:19132", "Steve");
        payload
            .extra
            .insert("TrustedSkin".to_owned(), serde_json::Value::Bool(true));

        let json = serde_json::to_string(&payload).unwrap();
        let parsed: UserPayload = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, payload);
        assert_eq!(parsed.extra["TrustedSkin"], serde_json::Value::Bool(true));
    }
}
