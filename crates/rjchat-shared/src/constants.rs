/// Collection holding one profile document per user, keyed by uid
pub const USERS_COLLECTION: &str = "users";

/// Collection holding one chat-index document per user, keyed by uid
pub const USER_CHATS_COLLECTION: &str = "userChats";

/// Collection holding one document per conversation (1:1 or group)
pub const CHATS_COLLECTION: &str = "chats";

/// Collection holding one status document per poster, keyed by uid
pub const STATUSES_COLLECTION: &str = "statuses";

/// Blob namespace for profile pictures (`avatars/<uid>`)
pub const AVATARS_NAMESPACE: &str = "avatars";

/// Blob namespace for images and story media (`images/<uuid>`)
pub const IMAGES_NAMESPACE: &str = "images";

/// Blob namespace for non-image attachments (`files/<uuid>`)
pub const FILES_NAMESPACE: &str = "files";

/// A story is visible while it is strictly younger than this many seconds
pub const STORY_TTL_SECS: i64 = 24 * 60 * 60;

/// Delay before a story view is confirmed and a receipt written
pub const STORY_VIEW_DELAY_MS: u64 = 1_000;

/// Display name used when neither the directory nor the index knows a user
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Display name used for a group entry that carries no name yet
pub const UNNAMED_GROUP_NAME: &str = "Group";

/// Fallback display name for viewers and status posters
pub const FALLBACK_USER_NAME: &str = "User";

/// Last-message summary written when a group is created
pub const GROUP_CREATED_TEXT: &str = "Group created";

/// Last-message summary for an image sent without text
pub const IMAGE_SUMMARY_TEXT: &str = "📷 Image";

/// Prefix of the last-message summary for a file sent without text
pub const FILE_SUMMARY_PREFIX: &str = "📎 ";

/// Default "about" line of a fresh profile
pub const DEFAULT_ABOUT: &str = "Hey there! I am using Rj Chat.";

/// Avatar shown when a user never uploaded one
pub const DEFAULT_AVATAR_URL: &str = "https://cdn-icons-png.flaticon.com/512/149/149071.png";

/// Maximum attachment size in bytes (50 MiB)
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Minimum password length accepted by the auth provider
pub const MIN_PASSWORD_LEN: usize = 6;

