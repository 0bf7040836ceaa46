//! Object key layout.

use jumpclip_models::MediaId;

/// Key of a rendered clip: `clips/{owner}/{media_id}.mp4`.
pub fn clip_key(owner: &str, media_id: &MediaId) -> String {
    format!("clips/{}/{}.mp4", owner, media_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_key() {
        let id = MediaId::from_string("m-1");
        assert_eq!(clip_key("user-7", &id), "clips/user-7/m-1.mp4");
    }
}
