use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unknown,
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "male" => Self::Male,
            "female" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Personal,
    Organization,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Organization => "organization",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "organization" => Self::Organization,
            _ => Self::Personal,
        }
    }
}

/// Canonical user profile, owned by the user profile collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub nickname: String,
    pub avatar: String,
    pub gender: Gender,
    pub account_type: AccountType,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Cached projection shown next to tasks and participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBrief {
    pub user_id: String,
    pub nickname: String,
    pub avatar: String,
    pub gender: Gender,
    pub account_type: AccountType,
}

impl From<&UserProfile> for UserBrief {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            nickname: profile.nickname.clone(),
            avatar: profile.avatar.clone(),
            gender: profile.gender,
            account_type: profile.account_type,
        }
    }
}

/// Profile write; only present fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfilePatch {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub gender: Option<Gender>,
    pub account_type: Option<AccountType>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(nickname) = &self.nickname {
            profile.nickname = nickname.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(gender) = self.gender {
            profile.gender = gender;
        }
        if let Some(account_type) = self.account_type {
            profile.account_type = account_type;
        }
    }
}
