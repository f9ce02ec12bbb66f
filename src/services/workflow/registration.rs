use super::{texts, WorkflowEngine};
use crate::models::conversation::ConversationState;
use crate::models::users::{Profile, User};
use crate::repositories::ledger::LedgerError;
use crate::services::ServiceError;
use crate::transport::{ChatId, Sender};

impl WorkflowEngine {
    /// `/start [code]`. Always resets the conversation slot.
    pub(super) async fn start(
        &self,
        from: &Sender,
        chat_id: ChatId,
        argument: Option<&str>,
    ) -> Result<(), ServiceError> {
        if let Some(user) = self.ledger.find_user(from.id).await? {
            self.conversations.clear(from.id).await?;
            self.send(chat_id, texts::welcome_back(&user), Some(texts::main_menu()))
                .await;
            return Ok(());
        }

        let referral_code = argument
            .filter(|code| !code.is_empty())
            .map(str::to_string);
        self.conversations
            .set(
                from.id,
                ConversationState::AwaitingRegistration {
                    referral_code: referral_code.clone(),
                },
            )
            .await?;

        self.send(chat_id, texts::registration_prompt(&from.first_name), None)
            .await;
        self.send(
            self.config.admin_channel,
            texts::admin_new_visitor(from, referral_code.as_deref()),
            None,
        )
        .await;

        Ok(())
    }

    pub(super) async fn complete_registration(
        &self,
        from: &Sender,
        chat_id: ChatId,
        text: &str,
        referral_code: Option<String>,
    ) -> Result<(), ServiceError> {
        let Some(profile) = Profile::parse(from.id, from.username.clone(), text) else {
            self.send(chat_id, texts::registration_retry(), None).await;
            return Ok(());
        };

        let referrer = match referral_code {
            Some(code) => {
                let referrer = self.ledger.find_user_by_referral_code(&code).await?;
                if referrer.is_none() {
                    log::info!("User {} supplied unknown referral code {}", from.id, code);
                }
                referrer.filter(|referrer| referrer.id != from.id)
            }
            None => None,
        };

        let (user, created) = match self
            .ledger
            .create_user(&profile, referrer.as_ref().map(|referrer| referrer.id))
            .await
        {
            Ok(user) => (user, true),
            Err(LedgerError::DuplicateUser(_)) => (self.ledger.update_profile(&profile).await?, false),
            Err(e) => return Err(e.into()),
        };
        self.conversations.clear(from.id).await?;

        log::info!(
            "User {} {} (referred by {:?})",
            user.id,
            if created { "registered" } else { "updated profile" },
            user.referred_by
        );

        let referrer = referrer.filter(|_| created);
        self.send(
            self.config.admin_channel,
            texts::admin_registration(&user, created, referrer.as_ref()),
            None,
        )
        .await;
        if let Some(referrer) = &referrer {
            self.send(referrer.id, texts::new_referral(&user), None).await;
        }
        self.send(
            chat_id,
            texts::registration_complete(&user),
            Some(texts::main_menu()),
        )
        .await;

        Ok(())
    }

    /// Loads the actor's account, pointing unregistered users at `/start`.
    pub(super) async fn registered_user(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<Option<User>, ServiceError> {
        let user = self.ledger.find_user(from.id).await?;
        if user.is_none() {
            self.send(chat_id, texts::NOT_REGISTERED, None).await;
        }
        Ok(user)
    }

    pub(super) async fn show_main_menu(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<(), ServiceError> {
        if let Some(user) = self.registered_user(from, chat_id).await? {
            self.send(chat_id, texts::welcome_back(&user), Some(texts::main_menu()))
                .await;
        }
        Ok(())
    }

    pub(super) async fn show_balance(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<(), ServiceError> {
        if let Some(user) = self.registered_user(from, chat_id).await? {
            self.send(chat_id, texts::balance(&user), Some(texts::back_to_menu()))
                .await;
        }
        Ok(())
    }

    pub(super) async fn show_referral(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<(), ServiceError> {
        if let Some(user) = self.registered_user(from, chat_id).await? {
            let summary = self.ledger.referral_summary(user.id).await?;
            self.send(
                chat_id,
                texts::referral(&user, &summary, &self.config.bot_username),
                Some(texts::back_to_menu()),
            )
            .await;
        }
        Ok(())
    }
}
