//! Operations on a `User` value that keep its local state in step with the
//! service.
//!
//! Each method takes the client explicitly and mutates only `self`. Remote
//! errors propagate unchanged; `self` is left untouched when a call fails.

use serde::Serialize;

use crate::client::UsersClient;
use crate::error::{UsersError, UsersResult};
use crate::params::{AddressKey, Attributes, ContactKey, NewUser, UserChanges};
use crate::transport::Transport;
use crate::types::{reconcile, Address, Contact, User};

impl User {
    fn require_id(&self, operation: &str) -> UsersResult<String> {
        self.id
            .clone()
            .ok_or_else(|| UsersError::InvalidParam(format!("{operation} needs a user with an id")))
    }

    fn to_new_user(&self) -> NewUser {
        NewUser {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date,
            email: self.email.clone(),
            gender: self.gender.clone(),
            height: self.height,
            weight: self.weight,
            roles: self.roles.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Create this user remotely and adopt the assigned id.
    pub fn create<T: Transport>(&mut self, client: &UsersClient<T>) -> UsersResult<bool> {
        let created = client.create(&self.to_new_user())?;
        self.copy_from(created);
        Ok(true)
    }

    /// Save every set field of this user.
    pub fn update<T: Transport>(&mut self, client: &UsersClient<T>) -> UsersResult<bool> {
        let id = self.require_id("update")?;
        let new = self.to_new_user();
        let saved = client.update(&UserChanges {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            birth_date: new.birth_date,
            email: new.email,
            gender: new.gender,
            height: new.height,
            weight: new.weight,
            roles: new.roles,
            metadata: new.metadata,
        })?;
        self.copy_from(saved);
        Ok(true)
    }

    // --- contacts ---

    pub fn add_contact<T, P>(&mut self, client: &UsersClient<T>, params: &P) -> UsersResult<bool>
    where
        T: Transport,
        P: Serialize + ?Sized,
    {
        let user_id = self.require_id("add_contact")?;
        let attrs = Attributes::from_params(params)?.with("user_id", user_id);
        let contact = client.add_contact(&attrs)?;
        self.contacts.get_or_insert_with(Vec::new).push(contact);
        Ok(true)
    }

    /// Replace the local contacts with the service's list.
    pub fn all_contacts<T: Transport>(&mut self, client: &UsersClient<T>) -> UsersResult<&[Contact]> {
        let user_id = self.require_id("all_contacts")?;
        let contacts = client.all_contacts(&user_id)?;
        Ok(self.contacts.insert(contacts).as_slice())
    }

    /// Fetch one contact and merge it into the local list.
    pub fn find_contact<T: Transport>(
        &mut self,
        client: &UsersClient<T>,
        contact_id: &str,
    ) -> UsersResult<Contact> {
        let user_id = self.require_id("find_contact")?;
        let contact = client.find_contact(&ContactKey {
            user_id,
            contact_id: contact_id.to_string(),
        })?;
        reconcile(self.contacts.get_or_insert_with(Vec::new), contact.clone());
        Ok(contact)
    }

    /// Update a contact that is already in the local list.
    pub fn update_contact<T, P>(
        &mut self,
        client: &UsersClient<T>,
        contact_id: &str,
        params: &P,
    ) -> UsersResult<Contact>
    where
        T: Transport,
        P: Serialize + ?Sized,
    {
        let user_id = self.require_id("update_contact")?;
        let index = self.local_contact(contact_id)?;
        let attrs = Attributes::from_params(params)?
            .with("user_id", user_id)
            .with("contact_id", contact_id);
        let saved = client.update_contact(&attrs)?;

        let contacts = self.contacts.get_or_insert_with(Vec::new);
        contacts[index].copy_from(saved);
        Ok(contacts[index].clone())
    }

    pub fn delete_contact<T: Transport>(
        &mut self,
        client: &UsersClient<T>,
        contact_id: &str,
    ) -> UsersResult<bool> {
        let user_id = self.require_id("delete_contact")?;
        client.delete_contact(&ContactKey {
            user_id,
            contact_id: contact_id.to_string(),
        })?;
        if let Some(contacts) = self.contacts.as_mut() {
            contacts.retain(|c| c.id.as_deref() != Some(contact_id));
        }
        Ok(true)
    }

    fn local_contact(&self, contact_id: &str) -> UsersResult<usize> {
        self.contacts
            .as_deref()
            .and_then(|contacts| contacts.iter().position(|c| c.id.as_deref() == Some(contact_id)))
            .ok_or_else(|| {
                UsersError::Validation(format!(
                    "contact {contact_id} is not loaded on this user; refresh with all_contacts first"
                ))
            })
    }

    // --- addresses ---

    pub fn add_address<T, P>(&mut self, client: &UsersClient<T>, params: &P) -> UsersResult<bool>
    where
        T: Transport,
        P: Serialize + ?Sized,
    {
        let user_id = self.require_id("add_address")?;
        let attrs = Attributes::from_params(params)?.with("user_id", user_id);
        let address = client.add_address(&attrs)?;
        self.addresses.get_or_insert_with(Vec::new).push(address);
        Ok(true)
    }

    /// Replace the local addresses with the service's list.
    pub fn all_addresses<T: Transport>(&mut self, client: &UsersClient<T>) -> UsersResult<&[Address]> {
        let user_id = self.require_id("all_addresses")?;
        let addresses = client.all_addresses(&user_id)?;
        Ok(self.addresses.insert(addresses).as_slice())
    }

    /// Fetch one address and merge it into the local list.
    pub fn find_address<T: Transport>(
        &mut self,
        client: &UsersClient<T>,
        address_id: &str,
    ) -> UsersResult<Address> {
        let user_id = self.require_id("find_address")?;
        let address = client.find_address(&AddressKey {
            user_id,
            address_id: address_id.to_string(),
        })?;
        reconcile(self.addresses.get_or_insert_with(Vec::new), address.clone());
        Ok(address)
    }

    /// Update an address that is already in the local list.
    pub fn update_address<T, P>(
        &mut self,
        client: &UsersClient<T>,
        address_id: &str,
        params: &P,
    ) -> UsersResult<Address>
    where
        T: Transport,
        P: Serialize + ?Sized,
    {
        let user_id = self.require_id("update_address")?;
        let index = self.local_address(address_id)?;
        let attrs = Attributes::from_params(params)?
            .with("user_id", user_id)
            .with("address_id", address_id);
        let saved = client.update_address(&attrs)?;

        let addresses = self.addresses.get_or_insert_with(Vec::new);
        addresses[index].copy_from(saved);
        Ok(addresses[index].clone())
    }

    pub fn delete_address<T: Transport>(
        &mut self,
        client: &UsersClient<T>,
        address_id: &str,
    ) -> UsersResult<bool> {
        let user_id = self.require_id("delete_address")?;
        client.delete_address(&AddressKey {
            user_id,
            address_id: address_id.to_string(),
        })?;
        if let Some(addresses) = self.addresses.as_mut() {
            addresses.retain(|a| a.id.as_deref() != Some(address_id));
        }
        Ok(true)
    }

    fn local_address(&self, address_id: &str) -> UsersResult<usize> {
        self.addresses
            .as_deref()
            .and_then(|addresses| addresses.iter().position(|a| a.id.as_deref() == Some(address_id)))
            .ok_or_else(|| {
                UsersError::Validation(format!(
                    "address {address_id} is not loaded on this user; refresh with all_addresses first"
                ))
            })
    }
}
